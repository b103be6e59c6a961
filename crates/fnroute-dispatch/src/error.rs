use thiserror::Error;

/// Errors raised while building a dispatcher.
///
/// Nothing on the request path returns this type: `invoke` folds every
/// per-attempt problem into its returned record.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("unsupported config file extension: {ext:?}")]
    UnsupportedConfigFormat { ext: String },

    #[error("failed to parse config: {0}")]
    ConfigParse(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// Why a single attempt against one target did not produce a usable response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("transport failure calling {target}: {reason}")]
    Transport { target: String, reason: String },

    #[error("{target} answered with status {status}")]
    BadStatus { target: String, status: u16 },

    #[error("{target} returned a body that is not valid JSON: {reason}")]
    MalformedBody { target: String, reason: String },

    #[error("{target} did not answer within {timeout_ms}ms")]
    Timeout { target: String, timeout_ms: u64 },
}

impl BackendError {
    /// Short label used in logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Transport { .. } => "transport",
            BackendError::BadStatus { .. } => "bad_status",
            BackendError::MalformedBody { .. } => "malformed_body",
            BackendError::Timeout { .. } => "timeout",
        }
    }
}
