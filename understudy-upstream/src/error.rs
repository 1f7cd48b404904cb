//! Upstream call failures and the status each one reports.

use std::time::Duration;

use thiserror::Error;
use tonic::Code;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection to upstream failed: {0}")]
    Connect(String),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("RPC call failed with {code:?}: {message}")]
    Rpc { code: Code, message: String },

    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("could not read upstream reply: {0}")]
    Decode(String),

    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),
}

impl UpstreamError {
    /// HTTP-style status recorded on the failed child node.
    pub fn status_code(&self) -> u16 {
        match self {
            UpstreamError::Timeout(_) => 504,
            UpstreamError::Status(code) => *code,
            UpstreamError::Rpc { code, .. } => rpc_status(*code),
            UpstreamError::Connect(_)
            | UpstreamError::Transport(_)
            | UpstreamError::Decode(_)
            | UpstreamError::InvalidTarget(_) => 502,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, UpstreamError::Timeout(_))
    }
}

/// HTTP equivalent of an RPC status code.
pub fn rpc_status(code: Code) -> u16 {
    match code {
        Code::Ok => 200,
        Code::Cancelled => 499,
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => 400,
        Code::Unauthenticated => 401,
        Code::PermissionDenied => 403,
        Code::NotFound => 404,
        Code::AlreadyExists | Code::Aborted => 409,
        Code::ResourceExhausted => 429,
        Code::Unimplemented => 501,
        Code::Unavailable => 503,
        Code::DeadlineExceeded => 504,
        Code::Unknown | Code::Internal | Code::DataLoss => 500,
    }
}
