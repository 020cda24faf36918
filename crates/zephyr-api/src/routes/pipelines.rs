//! `/api/v1/trigger`: queue a pipeline run against a project.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::json;

use zephyr_config::TriggerContext;
use zephyr_core::entities::TriggerType;
use zephyr_core::id::ResourceId;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub project_id: ResourceId,
    pub pipeline_name: String,
    #[serde(default)]
    pub trigger_type: Option<TriggerType>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

pub async fn trigger(
    State(state): State<AppState>,
    Json(request): Json<TriggerRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ctx = TriggerContext {
        trigger_type: request.trigger_type,
        branch: request.branch.clone(),
        commit_sha: request.commit_sha.clone(),
        event_type: "manual".to_string(),
        repository: None,
        payload: request.payload,
    };

    let run_id = state
        .scheduler
        .queue_pipeline_run(
            request.project_id,
            &request.pipeline_name,
            ctx,
            request.branch.as_deref(),
            request.commit_sha.as_deref(),
        )
        .await?;

    Ok(Json(json!({ "run_id": run_id.to_string() })))
}
