mod master;
#[cfg(test)]
mod tests;
mod transport;
pub mod xmlrpc;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

pub use master::{RosMaster, RosNodeClient, SystemState};

/// Source of registered node names and of the XML-RPC endpoint each one
/// listens on.
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    async fn node_names(&self) -> Result<Vec<String>, RpcError>;

    async fn lookup_node(&self, name: &str) -> Result<String, RpcError>;
}

/// Asks a node, at the endpoint the registry handed out, for its OS pid.
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn get_pid(&self, uri: &str) -> Result<u32, RpcError>;
}

#[derive(Debug)]
pub enum RpcError {
    InvalidUri(String),
    Io(std::io::Error),
    Timeout(Duration),
    Http(u16),
    Fault { code: i64, message: String },
    /// ROS API status code other than 1.
    Status { code: i64, message: String },
    Malformed(String),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::InvalidUri(uri) => write!(f, "invalid XML-RPC uri {:?}", uri),
            RpcError::Io(err) => write!(f, "connection error: {}", err),
            RpcError::Timeout(limit) => write!(f, "no answer within {:?}", limit),
            RpcError::Http(status) => write!(f, "HTTP status {}", status),
            RpcError::Fault { code, message } => write!(f, "fault {}: {}", code, message),
            RpcError::Status { code, message } => {
                write!(f, "call returned status {}: {}", code, message)
            }
            RpcError::Malformed(what) => write!(f, "malformed response: {}", what),
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RpcError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RpcError {
    fn from(err: std::io::Error) -> Self {
        RpcError::Io(err)
    }
}
