//! Persistent entity types: the shapes the store (§6) reads and writes.
//!
//! These are plain data, not behaviour — they carry no I/O and no
//! validation beyond what their own constructors enforce. Status
//! transitions live in `zephyr-planner::dag` (for `Job`/`JobNode`) and in
//! the scheduler driver (for `PipelineRun`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::id::ResourceId;

/// A project: the tenant-scoped container for pipeline runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ResourceId,
    pub name: String,
    pub description: Option<String>,
    pub config_path: String,
}

/// What triggered a pipeline run to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Push,
    PullRequest,
    Tag,
    Schedule,
    Manual,
    Webhook,
}

/// One instance of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: ResourceId,
    pub project_id: ResourceId,
    pub pipeline_name: String,
    pub trigger_type: TriggerType,
    pub trigger_data: serde_json::Value,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub status: PipelineRunStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineRunStatus {
    Pending,
    Running,
    Success,
    Failure,
    Cancelled,
}

impl PipelineRunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failure | Self::Cancelled
        )
    }
}

impl PipelineRun {
    /// `finished_at` must be set iff the status is terminal — callers
    /// construct via this helper rather than setting the fields
    /// independently so the invariant can't drift apart.
    pub fn transition(&mut self, status: PipelineRunStatus, at: DateTime<Utc>) {
        if status == PipelineRunStatus::Running && self.started_at.is_none() {
            self.started_at = Some(at);
        }
        if status.is_terminal() {
            self.finished_at = Some(at);
        }
        self.status = status;
    }
}

/// Status of a single job within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Ready,
    Running,
    Success,
    Failure,
    Skipped,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failure | Self::Skipped | Self::Cancelled
        )
    }
}

/// A job: one node in a pipeline run's DAG, as stored.
///
/// `id` is the concatenation of the run id and the logical (possibly
/// matrix-expanded) job name, so matrix siblings get distinct ids —
/// see [`crate::id::JobId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: crate::id::JobId,
    pub pipeline_run_id: ResourceId,
    pub name: String,
    pub runner_image: String,
    pub depends_on: Vec<crate::id::JobId>,
    pub status: JobStatus,
    /// Set alongside a transition into `failure`: why, not just that.
    /// Left `None` for every other status.
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outputs: HashMap<String, String>,
}

/// Which stream a captured log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// An append-only log line for a job. Ordered by `(job_id, seq)`;
/// never mutated after being written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub job_id: crate::id::JobId,
    pub seq: u64,
    pub stream: LogStream,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

/// An immutable audit record of an inbound webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: ResourceId,
    pub provider: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub signature: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// A heterogeneous matrix dimension value. Stringified at interpolation
/// points; `MATRIX_*` env values are always `String(v)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatrixScalar {
    String(String),
    Number(f64),
    Bool(bool),
}

impl std::fmt::Display for MatrixScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}
