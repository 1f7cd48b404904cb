//! ## understudy-core::context
//! **Per-request state**
//!
//! The inbound request as seen by the orchestrator, the request's random
//! streams, and the deadline after which upstream calls are abandoned.

use bytes::Bytes;
use http::{HeaderMap, Method};
use tokio::time::Instant;

use crate::random::RequestRandom;

/// Transport-neutral view of the request that reached this node.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    /// A bodiless `GET` for `path`, which may carry a query string.
    pub fn get(path: &str) -> Self {
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (path, None),
        };

        Self {
            method: Method::GET,
            path: if path.is_empty() { "/".into() } else { path.into() },
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Path plus query string, as the caller sent it.
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) if !query.is_empty() => format!("{}?{}", self.path, query),
            _ => self.path.clone(),
        }
    }
}

/// Everything one request owns while it is being handled.
#[derive(Debug)]
pub struct RequestContext {
    pub inbound: InboundRequest,
    pub random: RequestRandom,
    pub started: Instant,
    /// When set, upstream calls still pending at this instant are abandoned.
    pub deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(inbound: InboundRequest, random: RequestRandom) -> Self {
        Self {
            inbound,
            random,
            started: Instant::now(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}
