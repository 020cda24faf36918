//! `/api/v1/*` auth: a static `X-API-Key` or `Authorization: Bearer`
//! check, not OAuth — there is no user session here, only a
//! server-to-server credential. Disabled (every request passes) when
//! `AppState::api_key` is `None`, for local development.

use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::state::AppState;

fn extract_key(headers: &HeaderMap) -> Option<String> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(key.to_string());
    }
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = &state.api_key else {
        return Ok(next.run(request).await);
    };

    match extract_key(request.headers()) {
        Some(ref provided) if provided == expected => Ok(next.run(request).await),
        _ => Err(ApiError::Unauthorized("missing or invalid API key".to_string())),
    }
}
