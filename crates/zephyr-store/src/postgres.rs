//! Postgres-backed [`Store`], built the way `PgPipelineRepo`/`PgLogRepo`
//! are: raw `sqlx::query_as` against a `PgPool`, one row struct per
//! table, `RETURNING *` on writes that hand back the new row.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use zephyr_core::entities::{
    Job, JobStatus, LogRecord, LogStream, PipelineRun, PipelineRunStatus, Project, TriggerType,
    WebhookDelivery,
};
use zephyr_core::id::{JobId, ResourceId};

use crate::error::{StoreError, StoreResult};
use crate::traits::{JobStore, LogStore, PipelineRunStore, ProjectStore, RunFilter, Store, WebhookStore};

pub async fn create_pool(database_url: &str) -> StoreResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|err| StoreError::Database(sqlx::Error::from(err)))
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn job_status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Ready => "ready",
        JobStatus::Running => "running",
        JobStatus::Success => "success",
        JobStatus::Failure => "failure",
        JobStatus::Skipped => "skipped",
        JobStatus::Cancelled => "cancelled",
    }
}

fn parse_job_status(s: &str) -> StoreResult<JobStatus> {
    Ok(match s {
        "pending" => JobStatus::Pending,
        "ready" => JobStatus::Ready,
        "running" => JobStatus::Running,
        "success" => JobStatus::Success,
        "failure" => JobStatus::Failure,
        "skipped" => JobStatus::Skipped,
        "cancelled" => JobStatus::Cancelled,
        other => return Err(StoreError::NotFound(format!("unknown job status {other}"))),
    })
}

fn run_status_str(status: PipelineRunStatus) -> &'static str {
    match status {
        PipelineRunStatus::Pending => "pending",
        PipelineRunStatus::Running => "running",
        PipelineRunStatus::Success => "success",
        PipelineRunStatus::Failure => "failure",
        PipelineRunStatus::Cancelled => "cancelled",
    }
}

fn parse_run_status(s: &str) -> StoreResult<PipelineRunStatus> {
    Ok(match s {
        "pending" => PipelineRunStatus::Pending,
        "running" => PipelineRunStatus::Running,
        "success" => PipelineRunStatus::Success,
        "failure" => PipelineRunStatus::Failure,
        "cancelled" => PipelineRunStatus::Cancelled,
        other => return Err(StoreError::NotFound(format!("unknown run status {other}"))),
    })
}

fn trigger_type_str(t: TriggerType) -> &'static str {
    match t {
        TriggerType::Push => "push",
        TriggerType::PullRequest => "pull_request",
        TriggerType::Tag => "tag",
        TriggerType::Schedule => "schedule",
        TriggerType::Manual => "manual",
        TriggerType::Webhook => "webhook",
    }
}

fn parse_trigger_type(s: &str) -> StoreResult<TriggerType> {
    Ok(match s {
        "push" => TriggerType::Push,
        "pull_request" => TriggerType::PullRequest,
        "tag" => TriggerType::Tag,
        "schedule" => TriggerType::Schedule,
        "manual" => TriggerType::Manual,
        "webhook" => TriggerType::Webhook,
        other => return Err(StoreError::NotFound(format!("unknown trigger type {other}"))),
    })
}

fn log_stream_str(s: LogStream) -> &'static str {
    match s {
        LogStream::Stdout => "stdout",
        LogStream::Stderr => "stderr",
    }
}

fn parse_log_stream(s: &str) -> StoreResult<LogStream> {
    Ok(match s {
        "stdout" => LogStream::Stdout,
        "stderr" => LogStream::Stderr,
        other => return Err(StoreError::NotFound(format!("unknown log stream {other}"))),
    })
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: uuid::Uuid,
    name: String,
    description: Option<String>,
    config_path: String,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: ResourceId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            config_path: row.config_path,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: uuid::Uuid,
    project_id: uuid::Uuid,
    pipeline_name: String,
    trigger_type: String,
    trigger_data: serde_json::Value,
    branch: Option<String>,
    commit_sha: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<RunRow> for PipelineRun {
    type Error = StoreError;

    fn try_from(row: RunRow) -> StoreResult<Self> {
        Ok(PipelineRun {
            id: ResourceId::from_uuid(row.id),
            project_id: ResourceId::from_uuid(row.project_id),
            pipeline_name: row.pipeline_name,
            trigger_type: parse_trigger_type(&row.trigger_type)?,
            trigger_data: row.trigger_data,
            branch: row.branch,
            commit_sha: row.commit_sha,
            status: parse_run_status(&row.status)?,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    pipeline_run_id: uuid::Uuid,
    name: String,
    runner_image: String,
    depends_on: serde_json::Value,
    status: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    outputs: serde_json::Value,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> StoreResult<Self> {
        let depends_on: Vec<String> = serde_json::from_value(row.depends_on)
            .map_err(|err| StoreError::NotFound(err.to_string()))?;
        let outputs: HashMap<String, String> = serde_json::from_value(row.outputs)
            .map_err(|err| StoreError::NotFound(err.to_string()))?;
        Ok(Job {
            id: JobId::from(row.id),
            pipeline_run_id: ResourceId::from_uuid(row.pipeline_run_id),
            name: row.name,
            runner_image: row.runner_image,
            depends_on: depends_on.into_iter().map(JobId::from).collect(),
            status: parse_job_status(&row.status)?,
            reason: row.reason,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
            outputs,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LogRow {
    job_id: String,
    seq: i64,
    stream: String,
    timestamp: DateTime<Utc>,
    content: String,
}

impl TryFrom<LogRow> for LogRecord {
    type Error = StoreError;

    fn try_from(row: LogRow) -> StoreResult<Self> {
        Ok(LogRecord {
            job_id: JobId::from(row.job_id),
            seq: row.seq as u64,
            stream: parse_log_stream(&row.stream)?,
            timestamp: row.timestamp,
            content: row.content,
        })
    }
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
        config_path: &str,
    ) -> StoreResult<Project> {
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
            INSERT INTO projects (id, name, description, config_path, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            RETURNING id, name, description, config_path
            "#,
        )
        .bind(uuid::Uuid::now_v7())
        .bind(name)
        .bind(description)
        .bind(config_path)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_project(&self, id: ResourceId) -> StoreResult<Project> {
        let row = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, name, description, config_path FROM projects WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("project {id}")))?;
        Ok(row.into())
    }

    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, name, description, config_path FROM projects ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Project::from).collect())
    }
}

#[async_trait]
impl PipelineRunStore for PgStore {
    async fn create_run(
        &self,
        project_id: ResourceId,
        pipeline_name: &str,
        trigger_type: TriggerType,
        trigger_data: serde_json::Value,
        branch: Option<&str>,
        commit_sha: Option<&str>,
    ) -> StoreResult<PipelineRun> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            INSERT INTO pipeline_runs
                (id, project_id, pipeline_name, trigger_type, trigger_data, branch, commit_sha, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', NOW())
            RETURNING *
            "#,
        )
        .bind(uuid::Uuid::now_v7())
        .bind(project_id.as_uuid())
        .bind(pipeline_name)
        .bind(trigger_type_str(trigger_type))
        .bind(trigger_data)
        .bind(branch)
        .bind(commit_sha)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get_run(&self, id: ResourceId) -> StoreResult<PipelineRun> {
        let row = sqlx::query_as::<_, RunRow>("SELECT * FROM pipeline_runs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("pipeline run {id}")))?;
        row.try_into()
    }

    async fn list_runs(&self, filter: RunFilter) -> StoreResult<Vec<PipelineRun>> {
        let status = filter.status.map(run_status_str);
        let rows = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT * FROM pipeline_runs
            WHERE ($1::uuid IS NULL OR project_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(filter.project_id.map(|id| *id.as_uuid()))
        .bind(status)
        .bind(filter.limit.unwrap_or(100))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PipelineRun::try_from).collect()
    }

    async fn update_run_status(
        &self,
        id: ResourceId,
        status: PipelineRunStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let started_at = matches!(status, PipelineRunStatus::Running).then_some(at);
        let finished_at = status.is_terminal().then_some(at);
        sqlx::query(
            r#"
            UPDATE pipeline_runs
            SET status = $2,
                started_at = COALESCE(started_at, $3),
                finished_at = COALESCE($4, finished_at)
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(run_status_str(status))
        .bind(started_at)
        .bind(finished_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create_job(
        &self,
        id: JobId,
        pipeline_run_id: ResourceId,
        name: &str,
        runner_image: &str,
        depends_on: Vec<JobId>,
    ) -> StoreResult<Job> {
        let depends_on_json = serde_json::to_value(
            depends_on.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
        )
        .expect("string vec serializes");
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs (id, pipeline_run_id, name, runner_image, depends_on, status, created_at, outputs)
            VALUES ($1, $2, $3, $4, $5, 'pending', NOW(), '{}')
            RETURNING *
            "#,
        )
        .bind(id.as_str())
        .bind(pipeline_run_id.as_uuid())
        .bind(name)
        .bind(runner_image)
        .bind(depends_on_json)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn update_job_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        new: JobStatus,
        at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> StoreResult<()> {
        let started_at = matches!(new, JobStatus::Running).then_some(at);
        let finished_at = new.is_terminal().then_some(at);
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $3,
                reason = $6,
                started_at = COALESCE(started_at, $4),
                finished_at = COALESCE($5, finished_at)
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id.as_str())
        .bind(job_status_str(expected))
        .bind(job_status_str(new))
        .bind(started_at)
        .bind(finished_at)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "job {id} was not in status {expected:?}"
            )));
        }
        Ok(())
    }

    async fn set_job_outputs(
        &self,
        id: &JobId,
        outputs: HashMap<String, String>,
    ) -> StoreResult<()> {
        let json = serde_json::to_value(outputs).expect("string map serializes");
        sqlx::query("UPDATE jobs SET outputs = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(json)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> StoreResult<Job> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
        row.try_into()
    }

    async fn get_jobs_for_pipeline_run(&self, run_id: ResourceId) -> StoreResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE pipeline_run_id = $1 ORDER BY created_at",
        )
        .bind(run_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn get_pending_jobs(&self, limit: i64) -> StoreResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE status = 'pending' ORDER BY created_at LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn count_jobs_by_status(&self) -> StoreResult<HashMap<JobStatus, i64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|(status, count)| Ok((parse_job_status(&status)?, count)))
            .collect()
    }
}

#[async_trait]
impl LogStore for PgStore {
    async fn append_log(
        &self,
        job_id: &JobId,
        stream: LogStream,
        content: &str,
    ) -> StoreResult<LogRecord> {
        let row = sqlx::query_as::<_, LogRow>(
            r#"
            INSERT INTO job_logs (job_id, seq, stream, timestamp, content)
            VALUES ($1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM job_logs WHERE job_id = $1), $2, NOW(), $3)
            RETURNING *
            "#,
        )
        .bind(job_id.as_str())
        .bind(log_stream_str(stream))
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get_logs_for_job(
        &self,
        job_id: &JobId,
        since: Option<u64>,
    ) -> StoreResult<Vec<LogRecord>> {
        let rows = sqlx::query_as::<_, LogRow>(
            "SELECT * FROM job_logs WHERE job_id = $1 AND seq > $2 ORDER BY seq ASC",
        )
        .bind(job_id.as_str())
        .bind(since.unwrap_or(0) as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(LogRecord::try_from).collect()
    }
}

#[async_trait]
impl WebhookStore for PgStore {
    async fn save_webhook_delivery(&self, delivery: WebhookDelivery) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO webhook_deliveries (id, provider, event_type, payload, signature, received_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(delivery.id.as_uuid())
        .bind(&delivery.provider)
        .bind(&delivery.event_type)
        .bind(&delivery.payload)
        .bind(&delivery.signature)
        .bind(delivery.received_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn destroy(&self) {
        self.pool.close().await;
    }
}
