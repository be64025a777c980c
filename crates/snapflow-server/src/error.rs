//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use snapflow_common::SnapflowError;
use thiserror::Error;

/// Errors surfaced by the HTTP API.
///
/// Error bodies follow the `{error, message}` shape; the not-found
/// variants carry their lookup key instead of a message. Underlying store
/// errors are logged and replaced with a generic message, never echoed to
/// callers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Record not found: {id}")]
    RecordNotFound { id: String },

    #[error("Route not found: {path}")]
    RouteNotFound { path: String },

    #[error("Invalid cursor")]
    InvalidCursor(#[source] SnapflowError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Store error: {0}")]
    Store(#[from] SnapflowError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::RecordNotFound { id } => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Record not found", "id": id })),
            )
                .into_response(),
            ApiError::RouteNotFound { path } => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Route not found", "path": path })),
            )
                .into_response(),
            ApiError::InvalidCursor(ref e) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid cursor", "message": e.to_string() })),
            )
                .into_response(),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Unauthorized",
                    "message": "Missing or invalid API key"
                })),
            )
                .into_response(),
            ApiError::Store(ref e) => {
                tracing::error!("Store error while serving request: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error",
                        "message": "A storage error occurred"
                    })),
                )
                    .into_response()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_record_not_found_shape() {
        let response = ApiError::RecordNotFound { id: "unknown-id".into() }.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "error": "Record not found", "id": "unknown-id" }));
    }

    #[tokio::test]
    async fn test_store_error_is_not_echoed() {
        let response =
            ApiError::Store(SnapflowError::Storage("pg://secret-host died".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "A storage error occurred");
    }
}
