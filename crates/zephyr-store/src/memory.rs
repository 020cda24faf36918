//! In-process store: no durability, no network round trip. This is
//! the store the CLI's `run` command drives directly (§6's "trivial
//! store that executes jobs synchronously in topological order").

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use zephyr_core::entities::{
    Job, JobStatus, LogRecord, LogStream, PipelineRun, PipelineRunStatus, Project, TriggerType,
    WebhookDelivery,
};
use zephyr_core::id::{JobId, ResourceId};

use crate::error::{StoreError, StoreResult};
use crate::traits::{JobStore, LogStore, PipelineRunStore, ProjectStore, RunFilter, Store, WebhookStore};

#[derive(Default)]
struct State {
    projects: HashMap<ResourceId, Project>,
    runs: HashMap<ResourceId, PipelineRun>,
    jobs: HashMap<JobId, Job>,
    logs: HashMap<JobId, Vec<LogRecord>>,
    webhooks: Vec<WebhookDelivery>,
}

/// `MemoryStore` is `Send + Sync` via a `std::sync::Mutex`: every
/// operation here is a quick map mutation, never an awaited I/O call,
/// so a blocking lock is simpler than an async one.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
        config_path: &str,
    ) -> StoreResult<Project> {
        let project = Project {
            id: ResourceId::new(),
            name: name.to_string(),
            description: description.map(str::to_string),
            config_path: config_path.to_string(),
        };
        self.state
            .lock()
            .unwrap()
            .projects
            .insert(project.id, project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: ResourceId) -> StoreResult<Project> {
        self.state
            .lock()
            .unwrap()
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("project {id}")))
    }

    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let mut projects: Vec<Project> =
            self.state.lock().unwrap().projects.values().cloned().collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }
}

#[async_trait]
impl PipelineRunStore for MemoryStore {
    async fn create_run(
        &self,
        project_id: ResourceId,
        pipeline_name: &str,
        trigger_type: TriggerType,
        trigger_data: serde_json::Value,
        branch: Option<&str>,
        commit_sha: Option<&str>,
    ) -> StoreResult<PipelineRun> {
        let run = PipelineRun {
            id: ResourceId::new(),
            project_id,
            pipeline_name: pipeline_name.to_string(),
            trigger_type,
            trigger_data,
            branch: branch.map(str::to_string),
            commit_sha: commit_sha.map(str::to_string),
            status: PipelineRunStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };
        self.state.lock().unwrap().runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn get_run(&self, id: ResourceId) -> StoreResult<PipelineRun> {
        self.state
            .lock()
            .unwrap()
            .runs
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("pipeline run {id}")))
    }

    async fn list_runs(&self, filter: RunFilter) -> StoreResult<Vec<PipelineRun>> {
        let state = self.state.lock().unwrap();
        let mut runs: Vec<PipelineRun> = state
            .runs
            .values()
            .filter(|r| filter.project_id.is_none_or(|p| p == r.project_id))
            .filter(|r| filter.status.is_none_or(|s| s == r.status))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            runs.truncate(limit.max(0) as usize);
        }
        Ok(runs)
    }

    async fn update_run_status(
        &self,
        id: ResourceId,
        status: PipelineRunStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let run = state
            .runs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("pipeline run {id}")))?;
        run.transition(status, at);
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(
        &self,
        id: JobId,
        pipeline_run_id: ResourceId,
        name: &str,
        runner_image: &str,
        depends_on: Vec<JobId>,
    ) -> StoreResult<Job> {
        let job = Job {
            id: id.clone(),
            pipeline_run_id,
            name: name.to_string(),
            runner_image: runner_image.to_string(),
            depends_on,
            status: JobStatus::Pending,
            reason: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            outputs: HashMap::new(),
        };
        self.state.lock().unwrap().jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn update_job_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        new: JobStatus,
        at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
        if job.status != expected {
            return Err(StoreError::Conflict(format!(
                "job {id} was not in status {expected:?}"
            )));
        }
        if new == JobStatus::Running && job.started_at.is_none() {
            job.started_at = Some(at);
        }
        if new.is_terminal() {
            job.finished_at = Some(at);
        }
        job.status = new;
        job.reason = reason.map(str::to_string);
        Ok(())
    }

    async fn set_job_outputs(
        &self,
        id: &JobId,
        outputs: HashMap<String, String>,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
        job.outputs = outputs;
        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> StoreResult<Job> {
        self.state
            .lock()
            .unwrap()
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("job {id}")))
    }

    async fn get_jobs_for_pipeline_run(&self, run_id: ResourceId) -> StoreResult<Vec<Job>> {
        let state = self.state.lock().unwrap();
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| j.pipeline_run_id == run_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }

    async fn get_pending_jobs(&self, limit: i64) -> StoreResult<Vec<Job>> {
        let state = self.state.lock().unwrap();
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn count_jobs_by_status(&self) -> StoreResult<HashMap<JobStatus, i64>> {
        let mut counts = HashMap::new();
        for job in self.state.lock().unwrap().jobs.values() {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn append_log(
        &self,
        job_id: &JobId,
        stream: LogStream,
        content: &str,
    ) -> StoreResult<LogRecord> {
        let mut state = self.state.lock().unwrap();
        let entries = state.logs.entry(job_id.clone()).or_default();
        let seq = entries.last().map(|r| r.seq + 1).unwrap_or(1);
        let record = LogRecord {
            job_id: job_id.clone(),
            seq,
            stream,
            timestamp: Utc::now(),
            content: content.to_string(),
        };
        entries.push(record.clone());
        Ok(record)
    }

    async fn get_logs_for_job(
        &self,
        job_id: &JobId,
        since: Option<u64>,
    ) -> StoreResult<Vec<LogRecord>> {
        let since = since.unwrap_or(0);
        Ok(self
            .state
            .lock()
            .unwrap()
            .logs
            .get(job_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|r| r.seq > since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl WebhookStore for MemoryStore {
    async fn save_webhook_delivery(&self, delivery: WebhookDelivery) -> StoreResult<()> {
        self.state.lock().unwrap().webhooks.push(delivery);
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn destroy(&self) {
        let mut state = self.state.lock().unwrap();
        *state = State::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn job_status_cas_rejects_stale_expected() {
        let store = MemoryStore::new();
        let project = store.create_project("demo", None, "zephyr.toml").await.unwrap();
        let run = store
            .create_run(
                project.id,
                "build",
                TriggerType::Manual,
                serde_json::json!({}),
                None,
                None,
            )
            .await
            .unwrap();
        let id = JobId::new(run.id, "build");
        store
            .create_job(id.clone(), run.id, "build", "alpine:latest", vec![])
            .await
            .unwrap();

        store
            .update_job_status(&id, JobStatus::Pending, JobStatus::Running, Utc::now(), None)
            .await
            .unwrap();

        let err = store
            .update_job_status(&id, JobStatus::Pending, JobStatus::Running, Utc::now(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn log_seq_is_monotonic_per_job() {
        let store = MemoryStore::new();
        let run_id = ResourceId::new();
        let job_id = JobId::new(run_id, "build");

        let a = store
            .append_log(&job_id, LogStream::Stdout, "hello")
            .await
            .unwrap();
        let b = store
            .append_log(&job_id, LogStream::Stdout, "world")
            .await
            .unwrap();
        assert_eq!(a.seq, 1);
        assert_eq!(b.seq, 2);

        let since_a = store.get_logs_for_job(&job_id, Some(a.seq)).await.unwrap();
        assert_eq!(since_a.len(), 1);
        assert_eq!(since_a[0].content, "world");
    }

    #[tokio::test]
    async fn run_filter_narrows_by_project_and_status() {
        let store = MemoryStore::new();
        let project_a = store.create_project("a", None, "a.toml").await.unwrap();
        let project_b = store.create_project("b", None, "b.toml").await.unwrap();

        store
            .create_run(project_a.id, "build", TriggerType::Manual, serde_json::json!({}), None, None)
            .await
            .unwrap();
        let run_b = store
            .create_run(project_b.id, "build", TriggerType::Manual, serde_json::json!({}), None, None)
            .await
            .unwrap();
        store
            .update_run_status(run_b.id, PipelineRunStatus::Success, Utc::now())
            .await
            .unwrap();

        let runs = store
            .list_runs(RunFilter {
                project_id: Some(project_b.id),
                status: None,
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, run_b.id);

        let pending = store
            .list_runs(RunFilter {
                project_id: None,
                status: Some(PipelineRunStatus::Pending),
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }
}
