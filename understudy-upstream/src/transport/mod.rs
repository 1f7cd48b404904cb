//! ## understudy-upstream::transport
//! **Wire-level clients behind one capability**
//!
//! A transport sends one prepared call and reports either the upstream's
//! reply, whatever its status, or a failure to obtain a reply at all. Turning
//! either into a response node is the invoker's job.

mod http;
mod rpc;

use std::fmt::Debug;
use std::time::Duration;

use ::http::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;

use crate::UpstreamError;

pub use self::http::HttpTransport;
pub use self::rpc::{HandleRequest, HandleResponse, RpcTransport, HANDLE_PATH};

/// One outbound call, fully prepared by the invoker.
#[derive(Debug, Clone)]
pub struct OutboundCall {
    /// Address of the upstream, as produced by target parsing.
    pub endpoint: String,
    /// Inbound path and query to append, when requests are forwarded.
    pub path_and_query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

impl OutboundCall {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            path_and_query: None,
            headers: HeaderMap::new(),
            body: None,
            timeout,
        }
    }

    /// Endpoint joined with the forwarded path, without doubling slashes.
    pub fn url(&self) -> String {
        match self.path_and_query.as_deref() {
            Some(path) if !path.is_empty() && path != "/" => format!(
                "{}/{}",
                self.endpoint.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            _ => self.endpoint.clone(),
        }
    }
}

/// What came back from an upstream that answered.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends calls to upstreams.
///
/// Implementations must honor `call.timeout` and report transport failures
/// as errors, while application failures come back as a response carrying
/// the upstream's status.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn send(&self, call: OutboundCall) -> Result<TransportResponse, UpstreamError>;
}
