//! Store operations (§6): typed persistence contracts the scheduler,
//! the edge, and the CLI all drive through the same way. Any backing
//! engine may satisfy them — see [`crate::postgres::PgStore`] and
//! [`crate::memory::MemoryStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use zephyr_core::entities::{
    Job, JobStatus, LogRecord, LogStream, PipelineRun, PipelineRunStatus, Project, TriggerType,
    WebhookDelivery,
};
use zephyr_core::id::{JobId, ResourceId};

use crate::error::StoreResult;

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
        config_path: &str,
    ) -> StoreResult<Project>;
    async fn get_project(&self, id: ResourceId) -> StoreResult<Project>;
    async fn list_projects(&self) -> StoreResult<Vec<Project>>;
}

/// Filters for [`PipelineRunStore::list_runs`]; all fields optional.
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub project_id: Option<ResourceId>,
    pub status: Option<PipelineRunStatus>,
    pub limit: Option<i64>,
}

#[async_trait]
pub trait PipelineRunStore: Send + Sync {
    async fn create_run(
        &self,
        project_id: ResourceId,
        pipeline_name: &str,
        trigger_type: TriggerType,
        trigger_data: serde_json::Value,
        branch: Option<&str>,
        commit_sha: Option<&str>,
    ) -> StoreResult<PipelineRun>;
    async fn get_run(&self, id: ResourceId) -> StoreResult<PipelineRun>;
    async fn list_runs(&self, filter: RunFilter) -> StoreResult<Vec<PipelineRun>>;
    async fn update_run_status(
        &self,
        id: ResourceId,
        status: PipelineRunStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(
        &self,
        id: JobId,
        pipeline_run_id: ResourceId,
        name: &str,
        runner_image: &str,
        depends_on: Vec<JobId>,
    ) -> StoreResult<Job>;

    /// Atomic compare-and-set: succeeds only if the job's current
    /// status equals `expected`. Returns `StoreError::Conflict` if
    /// another caller already transitioned it. `reason` is persisted
    /// alongside a transition into `failure`; pass `None` for every
    /// other target status.
    async fn update_job_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        new: JobStatus,
        at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> StoreResult<()>;

    async fn set_job_outputs(
        &self,
        id: &JobId,
        outputs: HashMap<String, String>,
    ) -> StoreResult<()>;

    async fn get_job(&self, id: &JobId) -> StoreResult<Job>;
    async fn get_jobs_for_pipeline_run(&self, run_id: ResourceId) -> StoreResult<Vec<Job>>;
    async fn get_pending_jobs(&self, limit: i64) -> StoreResult<Vec<Job>>;
    async fn count_jobs_by_status(&self) -> StoreResult<HashMap<JobStatus, i64>>;
}

#[async_trait]
pub trait LogStore: Send + Sync {
    async fn append_log(
        &self,
        job_id: &JobId,
        stream: LogStream,
        content: &str,
    ) -> StoreResult<LogRecord>;
    async fn get_logs_for_job(
        &self,
        job_id: &JobId,
        since: Option<u64>,
    ) -> StoreResult<Vec<LogRecord>>;
}

#[async_trait]
pub trait WebhookStore: Send + Sync {
    async fn save_webhook_delivery(&self, delivery: WebhookDelivery) -> StoreResult<()>;
}

/// The full persistence surface the scheduler driver and the edge
/// depend on.
#[async_trait]
pub trait Store: ProjectStore + PipelineRunStore + JobStore + LogStore + WebhookStore {
    /// Tear down any held resources (connection pools, background
    /// tasks). Idempotent.
    async fn destroy(&self);
}
