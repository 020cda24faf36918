//! `/api/v1/jobs/{id}` and `/api/v1/jobs/{id}/logs`.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use zephyr_core::entities::{Job, LogRecord};
use zephyr_core::id::JobId;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<Job>, ApiError> {
    let job = state.store.get_job(&job_id).await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub since: Option<u64>,
}

pub async fn get_job_logs(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<LogRecord>>, ApiError> {
    let logs = state.store.get_logs_for_job(&job_id, query.since).await?;
    Ok(Json(logs))
}
