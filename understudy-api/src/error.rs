use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: SocketAddr,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Failed to serialize response tree: {0}")]
    Serialization(#[from] serde_json::Error),
}
