use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::uri::PathAndQuery;
use http::HeaderMap;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue, MetadataMap};
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};
use tracing::debug;

use super::{OutboundCall, Transport, TransportResponse};
use crate::UpstreamError;

/// Method every understudy RPC node serves.
pub const HANDLE_PATH: &str = "/FakeService.FakeService/Handle";

#[derive(Clone, PartialEq, prost::Message)]
pub struct HandleRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
}

/// `message` carries the upstream's serialized response tree.
#[derive(Clone, PartialEq, prost::Message)]
pub struct HandleResponse {
    #[prost(string, tag = "1")]
    pub message: String,
}

/// Unary RPC client for a single upstream.
#[derive(Debug, Clone)]
pub struct RpcTransport {
    channel: Channel,
}

impl RpcTransport {
    /// Builds the channel without connecting. The first call connects.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect_lazy(endpoint: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let channel = Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| UpstreamError::InvalidTarget(format!("{endpoint}: {e}")))?
            .timeout(timeout)
            .connect_lazy();

        Ok(Self { channel })
    }
}

#[async_trait]
impl Transport for RpcTransport {
    async fn send(&self, call: OutboundCall) -> Result<TransportResponse, UpstreamError> {
        let mut client = Grpc::new(self.channel.clone());
        client
            .ready()
            .await
            .map_err(|e| UpstreamError::Connect(e.to_string()))?;

        let mut request = tonic::Request::new(HandleRequest {
            data: call.body.map(|body| body.to_vec()).unwrap_or_default(),
        });
        request.set_timeout(call.timeout);
        forward_metadata(&call.headers, request.metadata_mut());

        debug!(endpoint = %call.endpoint, "Calling RPC upstream");
        let codec: ProstCodec<HandleRequest, HandleResponse> = ProstCodec::default();
        let response = client
            .unary(request, PathAndQuery::from_static(HANDLE_PATH), codec)
            .await
            .map_err(|status| classify(status, call.timeout))?;

        Ok(TransportResponse {
            status: 200,
            body: Bytes::from(response.into_inner().message),
        })
    }
}

/// Copies forwardable headers into request metadata. Binary, reserved and
/// non-ASCII entries are skipped.
fn forward_metadata(headers: &HeaderMap, metadata: &mut MetadataMap) {
    for (name, value) in headers {
        let name = name.as_str();
        if name == "content-type" || name.starts_with("grpc-") {
            continue;
        }

        let Ok(key) = AsciiMetadataKey::from_bytes(name.as_bytes()) else {
            continue;
        };
        let Ok(value) = AsciiMetadataValue::try_from(value.as_bytes()) else {
            continue;
        };
        metadata.append(key, value);
    }
}

fn classify(status: Status, timeout: Duration) -> UpstreamError {
    match status.code() {
        Code::DeadlineExceeded => UpstreamError::Timeout(timeout),
        Code::Unavailable => UpstreamError::Connect(status.message().to_string()),
        code => UpstreamError::Rpc {
            code,
            message: status.message().to_string(),
        },
    }
}
