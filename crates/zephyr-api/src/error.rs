//! API error handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<zephyr_core::Error> for ApiError {
    fn from(err: zephyr_core::Error) -> Self {
        match err {
            zephyr_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            zephyr_core::Error::InvalidConfig(msg) => ApiError::BadRequest(msg),
            zephyr_core::Error::CyclicDependency(msg) => ApiError::BadRequest(msg),
            zephyr_core::Error::Unauthorised(msg) => ApiError::Unauthorized(msg),
            zephyr_core::Error::StoreConflict(msg) | zephyr_core::Error::IllegalTransition(msg) => {
                ApiError::Conflict(msg)
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<zephyr_store::StoreError> for ApiError {
    fn from(err: zephyr_store::StoreError) -> Self {
        ApiError::from(zephyr_core::Error::from(err))
    }
}
