//! The declarative pipeline configuration model.
//!
//! These types are the parsed, already-validated shape the planner
//! consumes; how they get onto disk (file format, remote fetch) is
//! someone else's problem. Every constructor here is a plain struct
//! literal or a thin `new` — the interesting logic lives in
//! `zephyr-planner`, not here.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use zephyr_core::condition::Condition;
use zephyr_core::entities::{MatrixScalar, TriggerType};

/// The facts about an incoming event used to resolve dynamic pipelines
/// and to evaluate step/job conditions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerContext {
    pub trigger_type: Option<TriggerType>,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub event_type: String,
    pub repository: Option<String>,
    pub payload: serde_json::Value,
}

/// A trigger entry naming one event type a pipeline fires on, with an
/// optional branch filter (exact match, no globbing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDef {
    pub trigger_type: TriggerType,
    pub branches: Vec<String>,
}

/// One parameter sweep dimension set, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct MatrixDef {
    /// Dimension name -> its candidate values, outer-to-inner in
    /// declaration order.
    pub values: Vec<(String, Vec<MatrixScalar>)>,
    pub exclude: Vec<Vec<(String, MatrixScalar)>>,
    pub include: Vec<Vec<(String, MatrixScalar)>>,
    /// Advisory only; the scheduler's global concurrency cap is the
    /// actual enforcement point.
    pub max_parallel: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    Run,
    Setup,
}

/// One executable action within a job: run a command, or provision a
/// named runtime version onto `PATH` for later steps.
#[derive(Debug, Clone)]
pub struct StepDef {
    pub id: String,
    pub kind: StepKind,
    /// The shell command for `Run` steps; unused for `Setup`.
    pub command: Option<String>,
    /// Shell the command is handed to; defaults to `bash`.
    pub shell: String,
    /// `(runtime, version)` for `Setup` steps; unused for `Run`.
    pub runtime: Option<(String, String)>,
    pub env: HashMap<String, String>,
    pub workdir: Option<String>,
    pub condition: Option<Condition>,
    pub continue_on_error: bool,
    pub timeout_secs: Option<u64>,
}

impl StepDef {
    pub fn run(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: StepKind::Run,
            command: Some(command.into()),
            shell: "bash".to_string(),
            runtime: None,
            env: HashMap::new(),
            workdir: None,
            condition: None,
            continue_on_error: false,
            timeout_secs: None,
        }
    }

    pub fn setup(id: impl Into<String>, runtime: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: StepKind::Setup,
            command: None,
            shell: "bash".to_string(),
            runtime: Some((runtime.into(), version.into())),
            env: HashMap::new(),
            workdir: None,
            condition: None,
            continue_on_error: false,
            timeout_secs: None,
        }
    }
}

/// One job definition within a pipeline, prior to matrix expansion.
#[derive(Debug, Clone)]
pub struct JobDef {
    pub name: String,
    pub runner_image: String,
    pub depends_on: Vec<String>,
    pub env: HashMap<String, String>,
    pub steps: Vec<StepDef>,
    pub matrix: Option<MatrixDef>,
    pub condition: Option<Condition>,
}

impl JobDef {
    pub fn new(name: impl Into<String>, runner_image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runner_image: runner_image.into(),
            depends_on: Vec::new(),
            env: HashMap::new(),
            steps: Vec::new(),
            matrix: None,
            condition: None,
        }
    }
}

/// A named collection of jobs with triggers and shared environment.
#[derive(Debug, Clone)]
pub struct PipelineDef {
    pub name: String,
    pub triggers: Vec<TriggerDef>,
    pub env: HashMap<String, String>,
    pub jobs: Vec<JobDef>,
}

impl PipelineDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            triggers: Vec::new(),
            env: HashMap::new(),
            jobs: Vec::new(),
        }
    }
}

/// A `pipelines` value is either a fixed list or a computation from the
/// trigger context, evaluated once per trigger.
#[derive(Clone)]
pub enum PipelineSource {
    Static(Vec<PipelineDef>),
    Dynamic(Arc<dyn Fn(&TriggerContext) -> Vec<PipelineDef> + Send + Sync>),
}

impl std::fmt::Debug for PipelineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineSource::Static(pipelines) => {
                f.debug_tuple("Static").field(&pipelines.len()).finish()
            }
            PipelineSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// The top-level parsed configuration: a project plus its pipeline
/// source.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub project_name: String,
    pub pipelines: PipelineSource,
}
