//! The remote side of an attempt.
//!
//! [`Backend`] is the seam between routing and the network. [`HttpGateway`]
//! is the production implementation: a JSON POST to
//! `{base}/function/{target}` behind an HTTP gateway.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::{BackendError, DispatchError, Result};
use crate::target::Target;

/// Performs one call against one target.
///
/// Implementations may be invoked concurrently, including several times for
/// the same logical request when a hedge fires.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Sends `payload` to `target`; `Ok` only for a well-formed success response.
    async fn call(
        &self,
        target: &Target,
        payload: &Value,
    ) -> std::result::Result<Value, BackendError>;
}

/// Backend that talks to a function gateway over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpGateway {
    /// Builds a gateway client whose requests time out after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::HttpClient(e.to_string()))?;
        let mut gateway = Self::with_client(base_url, client);
        gateway.timeout = Some(timeout);
        Ok(gateway)
    }

    /// Uses a caller-provided client, e.g. to share a connection pool.
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout: None,
        }
    }

    pub fn function_url(&self, target: &Target) -> String {
        format!("{}/function/{}", self.base_url, target)
    }
}

#[async_trait]
impl Backend for HttpGateway {
    async fn call(
        &self,
        target: &Target,
        payload: &Value,
    ) -> std::result::Result<Value, BackendError> {
        let url = self.function_url(target);
        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout {
                        target: target.to_string(),
                        timeout_ms: self
                            .timeout
                            .map(|t| t.as_millis() as u64)
                            .unwrap_or_default(),
                    }
                } else {
                    BackendError::Transport {
                        target: target.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(BackendError::BadStatus {
                target: target.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| BackendError::Transport {
            target: target.to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&body).map_err(|e| BackendError::MalformedBody {
            target: target.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_url() {
        let gw = HttpGateway::new("http://127.0.0.1:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            gw.function_url(&Target::from("func-03")),
            "http://127.0.0.1:8080/function/func-03"
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let gw = HttpGateway::new(&format!("http://127.0.0.1:{}", port), Duration::from_secs(2))
            .unwrap();
        let err = gw
            .call(&Target::from("func-00"), &serde_json::json!({"arg": "x"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transport");
    }
}
