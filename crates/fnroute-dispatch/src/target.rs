//! Identifiers for the backend functions a dispatcher routes to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque name of one backend function in the fixed pool.
///
/// Cloning is cheap; the name is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Target(Arc<str>);

impl Target {
    pub fn new(name: impl AsRef<str>) -> Self {
        Target(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::new(name)
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target(Arc::from(name))
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.0.as_ref().to_owned()
    }
}

impl AsRef<str> for Target {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
