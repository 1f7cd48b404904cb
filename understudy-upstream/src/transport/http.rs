use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use understudy_config::UpstreamConfig;

use super::{OutboundCall, Transport, TransportResponse};
use crate::UpstreamError;

/// HTTP client shared by every HTTP upstream of a node.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let mut builder = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.allow_insecure);

        if !config.keep_alives {
            builder = builder.pool_max_idle_per_host(0);
        }

        let client = builder
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, call: OutboundCall) -> Result<TransportResponse, UpstreamError> {
        let url = call.url();
        let OutboundCall {
            headers,
            body,
            timeout,
            ..
        } = call;

        let request = match body {
            Some(body) => self.client.post(&url).body(body),
            None => self.client.get(&url),
        };

        debug!(%url, "Calling HTTP upstream");
        let response = request
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| classify(e, timeout))?;

        Ok(TransportResponse { status, body })
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> UpstreamError {
    if error.is_timeout() {
        UpstreamError::Timeout(timeout)
    } else if error.is_connect() {
        UpstreamError::Connect(error.to_string())
    } else if error.is_body() || error.is_decode() {
        UpstreamError::Decode(error.to_string())
    } else {
        UpstreamError::Transport(error.to_string())
    }
}
