//! server::error
//!
//! Adapts [`GatewayError`] to axum responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::engine::GatewayError;

/// Error returned by every handler: a [`GatewayError`] rendered as its
/// `ServerStatus` payload with the matching status code.
#[derive(Debug)]
pub struct AppError(pub GatewayError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.0.to_status();
        let code = StatusCode::from_u16(status.http_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if code.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(code = %code, error = %self.0, "request refused");
        }
        (code, Json(status)).into_response()
    }
}

impl<E: Into<GatewayError>> From<E> for AppError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_follows_the_taxonomy() {
        let resp = AppError(GatewayError::NotFound("gone".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = AppError(GatewayError::checkout_conflict(vec!["a.txt".into()])).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
