use std::net::SocketAddr;
use thiserror::Error;

/// Failures that stop the relay from starting or keep it from accepting.
///
/// Problems on a single connection never surface here; they are logged and
/// only end that connection.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid relay configuration: {0}")]
    InvalidConfig(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("relay task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
