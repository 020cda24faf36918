//! Liveness/readiness probes.

use axum::Json;
use axum::extract::State;
use serde_json::json;

use crate::state::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Ready once the store answers a trivial query; a CAS-backed in-memory
/// store is always ready, a Postgres-backed one reflects connectivity.
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.store.list_projects().await {
        Ok(_) => Json(json!({ "status": "ready" })),
        Err(err) => Json(json!({ "status": "not_ready", "error": err.to_string() })),
    }
}
