//! ## understudy-core::response
//! **The recursive response tree**
//!
//! Each node describes one service's outcome and carries one child per
//! upstream it called, in configured order. Children returned by upstream
//! understudy nodes are themselves full trees, so the root mirrors the whole
//! call graph below it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use understudy_config::TransportKind;

/// How a node was reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// The node that produced the tree.
    #[default]
    #[serde(rename = "root")]
    Root,
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "RPC", alias = "gRPC")]
    Rpc,
}

impl From<TransportKind> for NodeKind {
    fn from(kind: TransportKind) -> Self {
        match kind {
            TransportKind::Http => NodeKind::Http,
            TransportKind::Rpc => NodeKind::Rpc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseNode {
    pub name: String,

    #[serde(default)]
    pub uri: String,

    #[serde(rename = "type", default)]
    pub kind: NodeKind,

    #[serde(default)]
    pub start_time: DateTime<Utc>,

    #[serde(default)]
    pub end_time: DateTime<Utc>,

    /// Time spent on this node's own simulated work, human readable.
    #[serde(default)]
    pub duration: String,

    #[serde(default)]
    pub duration_ms: f64,

    #[serde(default)]
    pub body: String,

    pub code: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstream_calls: Vec<ResponseNode>,
}

impl ResponseNode {
    /// A successful, childless node stamped with the current time.
    pub fn new(name: impl Into<String>, uri: impl Into<String>, kind: NodeKind) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            uri: uri.into(),
            kind,
            start_time: now,
            end_time: now,
            duration: format!("{:?}", Duration::ZERO),
            duration_ms: 0.0,
            body: String::new(),
            code: 200,
            error: None,
            upstream_calls: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Marks the node as failed with `code`.
    pub fn with_error(mut self, code: u16, error: impl Into<String>) -> Self {
        self.code = code;
        self.error = Some(error.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.set_duration(duration);
        self
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = format!("{duration:?}");
        self.duration_ms = duration.as_micros() as f64 / 1000.0;
    }

    /// Records when the node's handling began and ended.
    pub fn with_times(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code) && self.error.is_none()
    }

    /// Number of nodes in this tree, including the root.
    pub fn node_count(&self) -> usize {
        1 + self
            .upstream_calls
            .iter()
            .map(ResponseNode::node_count)
            .sum::<usize>()
    }
}
