//! Real nodes on ephemeral ports calling each other over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use understudy_api::serve;
use understudy_config::{FaultConfig, NodeConfig};
use understudy_engine::RequestOrchestrator;

struct RunningNode {
    address: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

impl RunningNode {
    fn url(&self) -> String {
        format!("http://{}", self.address)
    }
}

async fn start(config: NodeConfig) -> RunningNode {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let node = Arc::new(RequestOrchestrator::from_config(config).unwrap());

    let (shutdown, stopped) = oneshot::channel::<()>();
    tokio::spawn(serve(listener, node, async move {
        let _ = stopped.await;
    }));

    RunningNode {
        address,
        _shutdown: shutdown,
    }
}

fn node(name: &str) -> NodeConfig {
    NodeConfig {
        name: name.into(),
        seed: Some(5),
        ..NodeConfig::default()
    }
}

fn closed_port() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{address}")
}

#[tokio::test(flavor = "multi_thread")]
async fn tree_spans_the_topology() {
    let payments = start(node("payments")).await;

    let mut failing = node("ledger");
    failing.fault = FaultConfig {
        rate: 1.0,
        code: 503,
        ..FaultConfig::default()
    };
    let ledger = start(failing).await;

    let unreachable = closed_port();
    let mut front = node("web");
    front.message = "front page".into();
    front.upstream.workers = 2;
    front.upstream.timeout_ms = 2_000;
    front.upstream.uris = vec![payments.url(), ledger.url(), unreachable.clone()];
    let web = start(front).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/orders?limit=5", web.url()))
        .header("x-request-id", "abc")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let tree: Value = serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(tree["name"], "web");
    assert_eq!(tree["type"], "root");
    assert_eq!(tree["uri"], "/orders?limit=5");
    assert_eq!(tree["body"], "front page");

    let children = tree["upstream_calls"].as_array().unwrap();
    assert_eq!(children.len(), 3);

    assert_eq!(children[0]["name"], "payments");
    assert_eq!(children[0]["type"], "HTTP");
    assert_eq!(children[0]["code"], 200);
    assert_eq!(children[0]["uri"], payments.url());

    assert_eq!(children[1]["name"], "ledger");
    assert_eq!(children[1]["code"], 503);
    assert_eq!(children[1]["error"], "Service error automatically injected");

    assert_eq!(children[2]["uri"], unreachable);
    assert_eq!(children[2]["code"], 502);
}

#[tokio::test(flavor = "multi_thread")]
async fn health_and_metrics_are_served() {
    let web = start(node("web")).await;
    let client = reqwest::Client::new();

    let health = client
        .get(format!("{}/health", web.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status().as_u16(), 200);
    assert_eq!(health.text().await.unwrap(), "OK");

    let handled = client.post(format!("{}/anything", web.url())).body("payload").send().await.unwrap();
    assert_eq!(handled.status().as_u16(), 200);

    let metrics = client
        .get(format!("{}/metrics", web.url()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains(r#"understudy_requests_total{code="200"} 1"#));
}
