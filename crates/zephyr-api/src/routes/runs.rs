//! `/api/v1/runs`: list pipeline runs, optionally filtered.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use zephyr_core::entities::PipelineRun;
use zephyr_core::id::ResourceId;
use zephyr_store::RunFilter;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    pub project_id: Option<ResourceId>,
    pub limit: Option<i64>,
}

pub async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<ListRunsQuery>,
) -> Result<Json<Vec<PipelineRun>>, ApiError> {
    let runs = state
        .store
        .list_runs(RunFilter {
            project_id: query.project_id,
            status: None,
            limit: query.limit,
        })
        .await?;
    Ok(Json(runs))
}
