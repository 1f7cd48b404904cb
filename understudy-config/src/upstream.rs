//! Upstream targets and call policy.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::ConfigError;

const HTTP_SCHEMES: [&str; 2] = ["http://", "https://"];
const RPC_SCHEME: &str = "grpc://";

/// How the upstream list is called and what is sent along.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream URIs in call order. Accepts a list or a comma separated string.
    #[serde(deserialize_with = "uri_list")]
    pub uris: Vec<String>,

    /// Maximum number of upstream calls in flight at once. 1 calls sequentially.
    #[validate(range(min = 1))]
    pub workers: usize,

    /// Per-call timeout in milliseconds.
    #[validate(range(min = 1))]
    pub timeout_ms: u64,

    /// Forward the inbound path, query string and headers to upstreams.
    pub append_request: bool,

    /// Keep idle HTTP connections around between calls.
    pub keep_alives: bool,

    /// Skip TLS certificate validation for HTTPS upstreams.
    pub allow_insecure: bool,

    /// Fixed body sent with every upstream call. Overrides size and variance.
    pub request_body: Option<String>,

    /// Size in bytes of a random body sent with every upstream call.
    pub request_size: usize,

    /// Percentage variance applied to `request_size`.
    pub request_variance: u32,

    /// Whether a failed child turns this node's own status into an error.
    pub propagate_errors: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            uris: Vec::new(),
            workers: 1,
            timeout_ms: 30_000,
            append_request: true,
            keep_alives: false,
            allow_insecure: false,
            request_body: None,
            request_size: 0,
            request_variance: 0,
            propagate_errors: false,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parses every configured URI, preserving order.
    pub fn targets(&self) -> Result<Vec<UpstreamTarget>, ConfigError> {
        self.uris.iter().map(|uri| uri.parse()).collect()
    }
}

/// Transport selected for an upstream by its URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Http,
    Rpc,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Http => f.write_str("HTTP"),
            TransportKind::Rpc => f.write_str("RPC"),
        }
    }
}

/// A parsed upstream URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    /// The URI exactly as configured. Reported in response trees.
    pub uri: String,
    /// Address the transport connects to.
    pub endpoint: String,
    pub kind: TransportKind,
}

impl UpstreamTarget {
    pub fn parse(uri: &str) -> Result<Self, ConfigError> {
        let uri = uri.trim();
        let invalid = |reason| ConfigError::InvalidTarget {
            uri: uri.to_string(),
            reason,
        };

        if let Some(address) = uri.strip_prefix(RPC_SCHEME) {
            if address.is_empty() || address.starts_with('/') {
                return Err(invalid("missing RPC host"));
            }
            return Ok(Self {
                uri: uri.to_string(),
                endpoint: format!("http://{address}"),
                kind: TransportKind::Rpc,
            });
        }

        let scheme = HTTP_SCHEMES
            .iter()
            .find(|scheme| uri.starts_with(**scheme))
            .ok_or_else(|| invalid("scheme must be http://, https:// or grpc://"))?;
        if uri.len() == scheme.len() || uri[scheme.len()..].starts_with('/') {
            return Err(invalid("missing HTTP host"));
        }

        Ok(Self {
            uri: uri.to_string(),
            endpoint: uri.to_string(),
            kind: TransportKind::Http,
        })
    }
}

impl FromStr for UpstreamTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UriList {
    Joined(String),
    Many(Vec<String>),
}

/// Accepts `"a, b,"` as well as `[a, b]`; trims entries and drops empties.
fn uri_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match UriList::deserialize(deserializer)? {
        UriList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        UriList::Many(many) => many,
    };

    Ok(raw
        .into_iter()
        .map(|uri| uri.trim().to_string())
        .filter(|uri| !uri.is_empty())
        .collect())
}
