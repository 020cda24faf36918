//! Route composition.

pub mod auth;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod pipelines;
pub mod runs;
pub mod webhooks;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use crate::state::AppState;
use crate::ws::ws_handler;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/trigger", post(pipelines::trigger))
        .route("/runs", get(runs::list_runs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}/logs", get(jobs::get_job_logs))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .route("/metrics", get(metrics::metrics))
        .route("/webhooks/{provider}", post(webhooks::receive))
        .route("/ws", get(ws_handler))
        .nest("/api/v1", api)
        .with_state(state)
}
