//! ## understudy-upstream::invoker
//! **One call to one upstream**
//!
//! An invoker never fails: a reply, an upstream error status, a transport
//! failure and a timeout all end up as a `ResponseNode` for its branch.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use understudy_config::{TransportKind, UpstreamConfig, UpstreamTarget};
use understudy_core::context::InboundRequest;
use understudy_core::response::ResponseNode;

use crate::transport::{HttpTransport, OutboundCall, RpcTransport, Transport, TransportResponse};
use crate::UpstreamError;

/// Error reported by calls still pending when a request's deadline fires.
pub const DEADLINE_EXCEEDED: &str = "request deadline exceeded";

/// Headers that describe a single connection and never travel upstream.
const HOP_BY_HOP: [&str; 10] = [
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, Clone)]
pub struct UpstreamInvoker {
    target: UpstreamTarget,
    transport: Arc<dyn Transport>,
    timeout: Duration,
    append_request: bool,
}

impl UpstreamInvoker {
    pub fn new(
        target: UpstreamTarget,
        transport: Arc<dyn Transport>,
        timeout: Duration,
        append_request: bool,
    ) -> Self {
        Self {
            target,
            transport,
            timeout,
            append_request,
        }
    }

    pub fn target(&self) -> &UpstreamTarget {
        &self.target
    }

    /// Calls the upstream once and describes the outcome as a node.
    #[instrument(skip_all, fields(upstream = %self.target.uri))]
    pub async fn invoke(&self, inbound: &InboundRequest, body: Option<Bytes>) -> ResponseNode {
        let start_time = Utc::now();
        let started = Instant::now();

        let call = self.outbound(inbound, body);
        let result = match tokio::time::timeout(self.timeout, self.transport.send(call)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(self.timeout)),
        };

        match result {
            Ok(response) => {
                debug!(status = response.status, "Upstream replied");
                self.node_from_reply(response, start_time, started.elapsed())
            }
            Err(error) => {
                warn!(%error, "Upstream call failed");
                self.node()
                    .with_error(error.status_code(), error.to_string())
                    .with_duration(started.elapsed())
                    .with_times(start_time, Utc::now())
            }
        }
    }

    /// Node for a call abandoned at the request deadline.
    pub fn abandoned(&self) -> ResponseNode {
        self.node().with_error(504, DEADLINE_EXCEEDED)
    }

    fn node(&self) -> ResponseNode {
        ResponseNode::new(
            self.target.uri.clone(),
            self.target.uri.clone(),
            self.target.kind.into(),
        )
    }

    fn outbound(&self, inbound: &InboundRequest, body: Option<Bytes>) -> OutboundCall {
        let mut call = OutboundCall::new(self.target.endpoint.clone(), self.timeout);
        call.body = body;

        if self.append_request {
            if self.target.kind == TransportKind::Http {
                call.path_and_query = Some(inbound.path_and_query());
            }
            call.headers = forwarded_headers(&inbound.headers);
        }

        call
    }

    /// A reply that parses as a tree becomes this branch's node. Anything
    /// else is kept as the body of a fresh node.
    fn node_from_reply(
        &self,
        response: TransportResponse,
        start_time: DateTime<Utc>,
        elapsed: Duration,
    ) -> ResponseNode {
        let mut node = match serde_json::from_slice::<ResponseNode>(&response.body) {
            Ok(mut tree) => {
                tree.uri = self.target.uri.clone();
                tree.kind = self.target.kind.into();
                tree
            }
            Err(_) => self
                .node()
                .with_body(String::from_utf8_lossy(&response.body))
                .with_duration(elapsed)
                .with_times(start_time, Utc::now()),
        };

        if !response.is_success() {
            node.code = response.status;
            if node.error.is_none() {
                node.error = Some(UpstreamError::Status(response.status).to_string());
            }
            warn!(
                upstream = %self.target.uri,
                status = response.status,
                "Upstream returned an error status"
            );
        }

        node
    }
}

fn forwarded_headers(inbound: &HeaderMap) -> HeaderMap {
    inbound
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Builds one invoker per configured target, in configured order.
///
/// HTTP targets share one client; each RPC target gets its own lazily
/// connected channel, so this must run inside a Tokio runtime.
pub fn build_invokers(config: &UpstreamConfig) -> Result<Vec<UpstreamInvoker>, UpstreamError> {
    let targets = config
        .targets()
        .map_err(|e| UpstreamError::InvalidTarget(e.to_string()))?;

    let mut http: Option<Arc<dyn Transport>> = None;
    let mut invokers = Vec::with_capacity(targets.len());

    for target in targets {
        let transport: Arc<dyn Transport> = match target.kind {
            TransportKind::Http => match &http {
                Some(shared) => shared.clone(),
                None => {
                    let shared: Arc<dyn Transport> = Arc::new(HttpTransport::new(config)?);
                    http = Some(shared.clone());
                    shared
                }
            },
            TransportKind::Rpc => Arc::new(RpcTransport::connect_lazy(
                &target.endpoint,
                config.timeout(),
            )?),
        };

        invokers.push(UpstreamInvoker::new(
            target,
            transport,
            config.timeout(),
            config.append_request,
        ));
    }

    Ok(invokers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use http::HeaderValue;
    use parking_lot::Mutex;
    use tracing_test::traced_test;
    use understudy_core::response::NodeKind;

    /// Replies with a fixed response after `delay`, remembering each call.
    #[derive(Debug)]
    struct ScriptedTransport {
        status: u16,
        body: &'static str,
        delay: Duration,
        calls: Mutex<Vec<OutboundCall>>,
    }

    impl ScriptedTransport {
        fn replying(status: u16, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body,
                delay: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, call: OutboundCall) -> Result<TransportResponse, UpstreamError> {
            self.calls.lock().push(call);
            tokio::time::sleep(self.delay).await;
            Ok(TransportResponse {
                status: self.status,
                body: Bytes::from_static(self.body.as_bytes()),
            })
        }
    }

    fn invoker(uri: &str, transport: Arc<ScriptedTransport>, append: bool) -> UpstreamInvoker {
        UpstreamInvoker::new(
            uri.parse().unwrap(),
            transport,
            Duration::from_millis(100),
            append,
        )
    }

    fn inbound() -> InboundRequest {
        let mut request = InboundRequest::get("/orders?limit=5");
        request
            .headers
            .insert("x-request-id", HeaderValue::from_static("abc"));
        request
            .headers
            .insert("host", HeaderValue::from_static("web:9090"));
        request
            .headers
            .insert("connection", HeaderValue::from_static("keep-alive"));
        request
    }

    #[tokio::test]
    async fn upstream_tree_is_retagged() {
        let transport = ScriptedTransport::replying(
            200,
            r#"{"name":"payments","type":"root","code":200,"body":"paid",
                "upstream_calls":[{"name":"ledger","type":"HTTP","code":200}]}"#,
        );
        let node = invoker("http://payments:9090", transport, true)
            .invoke(&inbound(), None)
            .await;

        assert_eq!(node.name, "payments");
        assert_eq!(node.uri, "http://payments:9090");
        assert_eq!(node.kind, NodeKind::Http);
        assert_eq!(node.body, "paid");
        assert_eq!(node.upstream_calls.len(), 1);
    }

    #[tokio::test]
    async fn plain_reply_becomes_body() {
        let transport = ScriptedTransport::replying(200, "pong");
        let node = invoker("http://legacy:8080", transport, true)
            .invoke(&inbound(), None)
            .await;

        assert_eq!(node.name, "http://legacy:8080");
        assert_eq!(node.body, "pong");
        assert!(node.is_success());
    }

    #[tokio::test]
    #[traced_test]
    async fn error_status_keeps_upstream_tree() {
        let transport = ScriptedTransport::replying(
            500,
            r#"{"name":"payments","code":500,"error":"Service error automatically injected",
                "upstream_calls":[{"name":"ledger","code":200}]}"#,
        );
        let node = invoker("http://payments:9090", transport, true)
            .invoke(&inbound(), None)
            .await;

        assert_eq!(node.code, 500);
        assert_eq!(
            node.error.as_deref(),
            Some("Service error automatically injected")
        );
        assert_eq!(node.upstream_calls.len(), 1);
        assert!(logs_contain("Upstream returned an error status"));
    }

    #[tokio::test]
    async fn error_status_without_tree_is_described() {
        let transport = ScriptedTransport::replying(503, "unavailable");
        let node = invoker("http://payments:9090", transport, true)
            .invoke(&inbound(), None)
            .await;

        assert_eq!(node.code, 503);
        assert_eq!(node.error.as_deref(), Some("upstream returned status 503"));
        assert_eq!(node.body, "unavailable");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upstream_times_out() {
        let transport = Arc::new(ScriptedTransport {
            status: 200,
            body: "late",
            delay: Duration::from_secs(5),
            calls: Mutex::new(Vec::new()),
        });
        let node = invoker("grpc://inventory:9091", transport, true)
            .invoke(&inbound(), None)
            .await;

        assert_eq!(node.code, 504);
        assert_eq!(node.kind, NodeKind::Rpc);
        assert!(node.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn inbound_request_is_forwarded() {
        let transport = ScriptedTransport::replying(200, "ok");
        invoker("http://payments:9090", transport.clone(), true)
            .invoke(&inbound(), Some(Bytes::from_static(b"data")))
            .await;

        let calls = transport.calls.lock();
        let call = &calls[0];
        assert_eq!(call.url(), "http://payments:9090/orders?limit=5");
        assert_eq!(call.headers.get("x-request-id").unwrap(), "abc");
        assert!(call.headers.get("host").is_none());
        assert!(call.headers.get("connection").is_none());
        assert_eq!(call.body.as_deref(), Some(&b"data"[..]));
    }

    #[tokio::test]
    async fn forwarding_can_be_disabled() {
        let transport = ScriptedTransport::replying(200, "ok");
        invoker("http://payments:9090", transport.clone(), false)
            .invoke(&inbound(), None)
            .await;

        let calls = transport.calls.lock();
        assert_eq!(calls[0].url(), "http://payments:9090");
        assert!(calls[0].headers.is_empty());
    }

    #[test]
    fn abandoned_call_reports_deadline() {
        let node = invoker(
            "http://payments:9090",
            ScriptedTransport::replying(200, ""),
            true,
        )
        .abandoned();
        assert_eq!(node.code, 504);
        assert_eq!(node.error.as_deref(), Some(DEADLINE_EXCEEDED));
    }

    #[tokio::test]
    async fn invokers_follow_configured_order() {
        let config = UpstreamConfig {
            uris: vec![
                "http://a:9090".into(),
                "grpc://b:9091".into(),
                "http://c:9092".into(),
            ],
            ..Default::default()
        };
        let invokers = build_invokers(&config).unwrap();
        let kinds: Vec<_> = invokers.iter().map(|i| i.target().kind).collect();
        assert_eq!(
            kinds,
            vec![TransportKind::Http, TransportKind::Rpc, TransportKind::Http]
        );
        assert!(Arc::ptr_eq(&invokers[0].transport, &invokers[2].transport));
    }
}
