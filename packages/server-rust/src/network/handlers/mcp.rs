//! `POST /mcp`: JSON-RPC entry point.
//!
//! Malformed bodies get HTTP 400 with a JSON-RPC error object, notifications
//! get 202 with no body, everything else gets 200 with the response.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use tailnet_mcp_core::RequestContext;
use tracing::warn;

use super::AppState;
use crate::mcp::{JsonRpcRequest, JsonRpcResponse};

pub async fn mcp_handler(
    State(state): State<AppState>,
    ctx: Option<Extension<RequestContext>>,
    body: Bytes,
) -> Response {
    let ctx = ctx.map(|Extension(ctx)| ctx);

    let request = match JsonRpcRequest::parse(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(code = e.code(), error = %e, "rejecting malformed JSON-RPC body");
            return (StatusCode::BAD_REQUEST, Json(JsonRpcResponse::error(None, &e)))
                .into_response();
        }
    };

    match state.mcp.handle(request, ctx).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
