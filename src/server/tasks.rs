//! server::tasks
//!
//! `/task/id/{id}`: poll (`GET`) and cancel (`DELETE`).
//!
//! A terminal snapshot never changes, so its body is served with an `ETag`
//! (sha-256 of the body) and a matching `If-None-Match` gets `304`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::error::AppError;
use super::AppState;
use crate::core::types::TaskId;
use crate::engine::GatewayError;

fn unknown(id: &TaskId) -> GatewayError {
    GatewayError::NotFound(format!("no task '{id}'"))
}

pub async fn poll_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let id = TaskId::parse(&id)?;
    let snapshot = state.gateway.tasks().poll(&id).ok_or_else(|| unknown(&id))?;
    let body = serde_json::to_vec(&snapshot).map_err(|e| GatewayError::Engine(format!("encoding task: {e}")))?;
    let json_type = (header::CONTENT_TYPE, "application/json".to_string());

    if !snapshot.state.is_terminal() {
        return Ok(([json_type], body).into_response());
    }

    let etag = format!("\"{}\"", hex::encode(Sha256::digest(&body)));
    let matches = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == etag);
    if matches {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }
    Ok(([json_type, (header::ETAG, etag)], body).into_response())
}

pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = TaskId::parse(&id)?;
    let cancelled = state.gateway.tasks().cancel(&id).ok_or_else(|| unknown(&id))?;
    Ok(Json(json!({ "Cancelled": cancelled })))
}
