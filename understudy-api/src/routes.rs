use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::error;
use understudy_core::context::InboundRequest;
use understudy_core::response::ResponseNode;

use crate::{AppState, ServeError};

pub async fn health() -> &'static str {
    "OK"
}

pub async fn metrics(State(node): State<AppState>) -> Response {
    match node.metrics().gather_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Every path and method not claimed above runs through the node.
pub async fn handle(
    State(node): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let inbound = InboundRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    };

    let tree = node.handle(inbound).await;
    render(&tree)
}

/// Answers with the tree as JSON and the root's code as status.
pub fn render(tree: &ResponseNode) -> Response {
    let status = StatusCode::from_u16(tree.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    match serde_json::to_vec(tree).map_err(ServeError::from) {
        Ok(body) => (status, [(CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            error!("{e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to serialize response",
            )
                .into_response()
        }
    }
}
