use std::fmt;

use crate::registry::RpcError;

#[derive(Debug)]
pub enum StatusError {
    /// The node is not registered, or asking it for its pid failed.
    Lookup { name: String, reason: String },
    /// The pid exited between resolution and sampling.
    ProcessGone { pid: u32 },
    MetricsUnavailable(String),
    /// Listing the registered nodes failed.
    Registry(RpcError),
}

impl StatusError {
    pub fn lookup(name: &str, reason: impl fmt::Display) -> Self {
        StatusError::Lookup {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusError::Lookup { name, reason } => {
                write!(f, "lookup of node {} failed: {}", name, reason)
            }
            StatusError::ProcessGone { pid } => write!(f, "process {} no longer exists", pid),
            StatusError::MetricsUnavailable(reason) => {
                write!(f, "metrics provider unavailable: {}", reason)
            }
            StatusError::Registry(err) => write!(f, "registry query failed: {}", err),
        }
    }
}

impl std::error::Error for StatusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StatusError::Registry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RpcError> for StatusError {
    fn from(err: RpcError) -> Self {
        StatusError::Registry(err)
    }
}

pub type Result<T> = std::result::Result<T, StatusError>;
