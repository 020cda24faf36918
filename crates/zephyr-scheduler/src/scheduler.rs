//! Job scheduler driver loop (§4.5): converts pending store rows into
//! executed jobs under a global concurrency cap, at-least-once.
//!
//! A poll loop claims ready rows via a CAS status update, owning the
//! claim logic itself rather than delegating it to a separate queue
//! type; dispatch and per-job progress tracking happen inline in
//! `execute_job` rather than over a separate event channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use zephyr_config::interpolate::InterpolationContext;
use zephyr_config::model::PipelineSource;
use zephyr_config::TriggerContext;
use zephyr_core::condition::ConditionContext;
use zephyr_core::entities::{Job, JobStatus, PipelineRunStatus, TriggerType};
use zephyr_core::id::{JobId, ResourceId};
use zephyr_core::logger::LoggerSink;
use zephyr_core::metrics::MetricsSink;
use zephyr_core::{Error, Result};
use zephyr_executor::{run_job, CancelToken, JobExecutionInput};
use zephyr_planner::{expand_matrix, resolve_pipelines, validate_pipeline, Dag, JobNode};
use zephyr_pool::WarmPool;
use zephyr_store::{RunFilter, Store};

use crate::observer::{JobEvent, ObserverBus};
use crate::store_logger::StoreLoggerSink;

/// Resolves a project's pipeline source. Loading and parsing the
/// on-disk config file is out of scope here (§6) — the scheduler only
/// ever consumes the already-parsed structure a caller hands it.
pub type ConfigProvider = Arc<dyn Fn(ResourceId) -> Result<PipelineSource> + Send + Sync>;

pub struct SchedulerConfig {
    pub max_concurrent: usize,
    pub poll_interval: std::time::Duration,
}

struct Inner {
    store: Arc<dyn Store>,
    pool: Option<Arc<WarmPool>>,
    metrics: Arc<dyn MetricsSink>,
    observer: Arc<ObserverBus>,
    config_provider: ConfigProvider,
    config: SchedulerConfig,
    running: AtomicBool,
    active_jobs: AsyncMutex<HashMap<JobId, JoinHandle<()>>>,
    /// One DAG per run queued by this process, kept in memory as the
    /// authoritative readiness source while the process is alive. A run
    /// recovered by [`Scheduler::reconcile_orphans`] after a restart has
    /// no entry here — `is_ready` falls back to checking dependency
    /// status straight off the store for those.
    dags: AsyncMutex<HashMap<ResourceId, Dag>>,
}

/// Cheaply cloneable handle to the scheduler's shared state, the same
/// shape `zephyr_pool::WarmPool` uses.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn Store>,
        pool: Option<Arc<WarmPool>>,
        metrics: Arc<dyn MetricsSink>,
        observer: Arc<ObserverBus>,
        config_provider: ConfigProvider,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                pool,
                metrics,
                observer,
                config_provider,
                config,
                running: AtomicBool::new(false),
                active_jobs: AsyncMutex::new(HashMap::new()),
                dags: AsyncMutex::new(HashMap::new()),
            }),
        }
    }

    /// `queuePipelineRun` (§4.5): persist the run, resolve and validate
    /// the named pipeline against the trigger context, expand every job
    /// (matrix included), and persist one job row per expanded
    /// instance with its dependency edges fanned out across matrix
    /// siblings.
    pub async fn queue_pipeline_run(
        &self,
        project_id: ResourceId,
        pipeline_name: &str,
        ctx: TriggerContext,
        branch: Option<&str>,
        commit_sha: Option<&str>,
    ) -> Result<ResourceId> {
        let source = (self.inner.config_provider)(project_id)?;
        let pipelines = resolve_pipelines(&source, &ctx);
        let pipeline = pipelines
            .into_iter()
            .find(|p| p.name == pipeline_name)
            .ok_or_else(|| Error::NotFound(format!("pipeline {pipeline_name}")))?;
        validate_pipeline(&pipeline).map_err(|err| Error::InvalidConfig(err.to_string()))?;

        let trigger_type = ctx.trigger_type.unwrap_or(TriggerType::Manual);
        let run = self
            .inner
            .store
            .create_run(
                project_id,
                pipeline_name,
                trigger_type,
                ctx.payload.clone(),
                branch,
                commit_sha,
            )
            .await?;

        let expanded: HashMap<&str, _> = pipeline
            .jobs
            .iter()
            .map(|job| (job.name.as_str(), expand_matrix(job)))
            .collect();

        let mut nodes = Vec::new();
        for job in &pipeline.jobs {
            for instance in &expanded[job.name.as_str()] {
                let id = JobId::new(run.id, &instance.instance_id);
                let mut depends_on = Vec::new();
                for dep_name in &job.depends_on {
                    for dep_instance in &expanded[dep_name.as_str()] {
                        depends_on.push(JobId::new(run.id, &dep_instance.instance_id));
                    }
                }
                self.inner
                    .store
                    .create_job(id.clone(), run.id, &instance.job_name, &instance.def.runner_image, depends_on.clone())
                    .await?;
                nodes.push(JobNode::new(id, instance.job_name.as_str(), depends_on));
            }
        }

        let dag = Dag::build(nodes)?;
        self.inner.dags.lock().await.insert(run.id, dag);

        Ok(run.id)
    }

    /// One iteration of the driver loop (§4.5 steps 1-7).
    pub async fn tick(&self) -> Result<()> {
        let counts = self.inner.store.count_jobs_by_status().await?;
        let pending = *counts.get(&JobStatus::Pending).unwrap_or(&0);
        self.inner.metrics.set_gauge("scheduler_queue_depth", pending as f64, &[]);

        let mut active_jobs = self.inner.active_jobs.lock().await;
        active_jobs.retain(|_, handle| !handle.is_finished());
        let capacity = self.inner.config.max_concurrent.saturating_sub(active_jobs.len());
        if capacity == 0 {
            return Ok(());
        }

        let candidates = self.inner.store.get_pending_jobs(capacity as i64).await?;
        let mut started = 0;
        for candidate in candidates {
            if started >= capacity {
                break;
            }
            if !self.is_ready(&candidate).await? {
                continue;
            }

            let now = Utc::now();
            match self
                .inner
                .store
                .update_job_status(&candidate.id, JobStatus::Pending, JobStatus::Running, now, None)
                .await
            {
                Ok(()) => {}
                Err(_) => continue, // lost the CAS race to another driver
            }
            if let Some(dag) = self.inner.dags.lock().await.get_mut(&candidate.pipeline_run_id) {
                let _ = dag.mark_running(&candidate.id);
            }

            let wait_seconds = (now - candidate.created_at).num_milliseconds() as f64 / 1000.0;
            self.inner
                .metrics
                .observe_histogram("scheduler_queue_wait_seconds", wait_seconds.max(0.0), &[]);

            let scheduler = self.clone();
            let job_id = candidate.id.clone();
            let warn_job_id = job_id.clone();
            let handle = tokio::spawn(async move {
                if let Err(err) = scheduler.execute_job(candidate).await {
                    warn!(job_id = %warn_job_id, error = %err, "job execution failed");
                }
            });
            active_jobs.insert(job_id, handle);
            started += 1;
        }

        Ok(())
    }

    /// A job is ready iff its run's DAG says so — `Ready` is only
    /// reached once every `depends_on` entry completed successfully.
    /// Runs without an in-memory DAG (recovered by
    /// [`Scheduler::reconcile_orphans`] after a restart) fall back to
    /// checking dependency status straight off the store, since
    /// `Dag::build` has no way to reconstruct partially-completed state.
    async fn is_ready(&self, job: &Job) -> Result<bool> {
        if let Some(dag) = self.inner.dags.lock().await.get(&job.pipeline_run_id) {
            return Ok(dag
                .get(&job.id)
                .map(|node| node.status == JobStatus::Ready)
                .unwrap_or(false));
        }

        for dep in &job.depends_on {
            let dep_job = self.inner.store.get_job(dep).await?;
            if dep_job.status != JobStatus::Success {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// `executeJob` (§4.5): load the pipeline config, resolve it with
    /// the run's context, locate the matching job definition, run the
    /// step executor, persist the terminal result, and notify
    /// subscribers.
    async fn execute_job(&self, job: Job) -> Result<()> {
        let run = self.inner.store.get_run(job.pipeline_run_id).await?;
        if run.status == PipelineRunStatus::Pending {
            let _ = self
                .inner
                .store
                .update_run_status(run.id, PipelineRunStatus::Running, Utc::now())
                .await;
        }

        let ctx = TriggerContext {
            trigger_type: Some(run.trigger_type),
            branch: run.branch.clone(),
            commit_sha: run.commit_sha.clone(),
            event_type: format!("{:?}", run.trigger_type).to_lowercase(),
            repository: None,
            payload: run.trigger_data.clone(),
        };
        let source = (self.inner.config_provider)(run.project_id)?;
        let pipelines = resolve_pipelines(&source, &ctx);
        let pipeline = pipelines
            .into_iter()
            .find(|p| p.name == run.pipeline_name)
            .ok_or_else(|| Error::NotFound(format!("pipeline {}", run.pipeline_name)))?;
        let job_def = pipeline
            .jobs
            .iter()
            .find(|j| j.name == job.name)
            .ok_or_else(|| Error::NotFound(format!("job {}", job.name)))?;

        // The instance id is everything after the run id in `JobId`;
        // re-expanding the matrix and matching on it recovers which
        // combination this row belongs to without persisting it
        // separately.
        let instance_suffix = job
            .id
            .as_str()
            .strip_prefix(&format!("{}:", run.id))
            .unwrap_or(job.id.as_str());
        let matrix_values = expand_matrix(job_def)
            .into_iter()
            .find(|instance| instance.instance_id == instance_suffix)
            .and_then(|instance| instance.matrix)
            .map(|combination| combination.values)
            .unwrap_or_default();

        let vm = match &self.inner.pool {
            Some(pool) => match pool.acquire().await {
                Ok(vm) => Some(vm),
                Err(err) => {
                    self.fail_job(&job, run.id, &format!("failed to acquire a VM: {err}")).await?;
                    return Ok(());
                }
            },
            None => None,
        };

        let mut needs = HashMap::new();
        let mut condition_needs = HashMap::new();
        for dep in &job.depends_on {
            let dep_job = self.inner.store.get_job(dep).await?;
            needs.insert(dep_job.name.clone(), dep_job.outputs.clone());
            condition_needs.insert(
                dep_job.name.clone(),
                format!("{:?}", dep_job.status).to_lowercase(),
            );
        }

        let logger: Arc<dyn LoggerSink> = Arc::new(StoreLoggerSink::new(self.inner.store.clone(), job.id.clone()));
        let interpolation = InterpolationContext {
            git_sha: run.commit_sha.clone(),
            git_branch: run.branch.clone(),
            pipeline_name: Some(run.pipeline_name.clone()),
            run_id: Some(run.id.to_string()),
            matrix: matrix_values,
            steps: HashMap::new(),
            needs,
            env: pipeline.env.clone(),
            secrets: HashMap::new(),
        };
        let condition_ctx = ConditionContext {
            branch: run.branch.clone(),
            event_type: ctx.event_type.clone(),
            needs: condition_needs,
            steps: HashMap::new(),
        };

        let workdir = std::env::temp_dir().join(job.id.as_str().replace(':', "_"));
        if let Err(err) = tokio::fs::create_dir_all(&workdir).await {
            warn!(job_id = %job.id, error = %err, "failed to create job workdir");
        }

        let result = run_job(JobExecutionInput {
            workdir,
            inherited_env: pipeline.env.clone(),
            logger: logger.clone(),
            interpolation,
            condition_ctx,
            cancel: CancelToken::new(),
            job: job_def,
        })
        .await;

        if let Some((handle, _network)) = vm {
            if let Some(pool) = &self.inner.pool {
                let _ = pool.release(&handle.id, false).await;
            }
        }

        let now = Utc::now();
        let (new_status, run_success) = match result.outcome {
            zephyr_executor::JobOutcome::Success => (JobStatus::Success, true),
            zephyr_executor::JobOutcome::Failure => (JobStatus::Failure, false),
        };
        let reason = (!run_success).then(|| result.failure_reason().unwrap_or_else(|| "job failed".to_string()));

        self.inner.store.set_job_outputs(&job.id, result.outputs()).await?;
        self.inner
            .store
            .update_job_status(&job.id, JobStatus::Running, new_status, now, reason.as_deref())
            .await?;
        let newly_skipped = {
            let mut dags = self.inner.dags.lock().await;
            match dags.get_mut(&run.id) {
                Some(dag) => {
                    let _ = dag.mark_completed(&job.id, run_success);
                    if run_success {
                        Vec::new()
                    } else {
                        dag.ids_with_status(JobStatus::Skipped)
                    }
                }
                None => Vec::new(),
            }
        };
        for skipped_id in newly_skipped {
            // Idempotent: a descendant already marked skipped by an
            // earlier failing sibling fails this CAS harmlessly.
            let _ = self
                .inner
                .store
                .update_job_status(
                    &skipped_id,
                    JobStatus::Pending,
                    JobStatus::Skipped,
                    now,
                    Some("upstream job failed"),
                )
                .await;
        }
        self.inner.metrics.incr_counter(
            "jobs_total",
            &[("status", if run_success { "success" } else { "failure" })],
        );

        self.inner.observer.publish(JobEvent {
            job_id: job.id.clone(),
            status: new_status,
            logs_delta: None,
            timestamp: now,
        });
        self.inner.observer.unsubscribe_all(&job.id);

        self.maybe_finish_run(run.id).await?;
        Ok(())
    }

    /// Fail a `running` job outright with `reason` — no step ever ran,
    /// so there are no outputs to persist — cascading skip to its
    /// dependents and notifying subscribers the same way a failed
    /// execution would.
    async fn fail_job(&self, job: &Job, run_id: ResourceId, reason: &str) -> Result<()> {
        let now = Utc::now();
        self.inner
            .store
            .update_job_status(&job.id, JobStatus::Running, JobStatus::Failure, now, Some(reason))
            .await?;

        let newly_skipped = {
            let mut dags = self.inner.dags.lock().await;
            match dags.get_mut(&run_id) {
                Some(dag) => {
                    let _ = dag.mark_completed(&job.id, false);
                    dag.ids_with_status(JobStatus::Skipped)
                }
                None => Vec::new(),
            }
        };
        for skipped_id in newly_skipped {
            let _ = self
                .inner
                .store
                .update_job_status(
                    &skipped_id,
                    JobStatus::Pending,
                    JobStatus::Skipped,
                    now,
                    Some("upstream job failed"),
                )
                .await;
        }
        self.inner.metrics.incr_counter("jobs_total", &[("status", "failure")]);

        self.inner.observer.publish(JobEvent {
            job_id: job.id.clone(),
            status: JobStatus::Failure,
            logs_delta: None,
            timestamp: now,
        });
        self.inner.observer.unsubscribe_all(&job.id);

        self.maybe_finish_run(run_id).await
    }

    /// If every job in the run has reached a terminal status, roll the
    /// run's own status up from them and drop its now-finished DAG.
    async fn maybe_finish_run(&self, run_id: ResourceId) -> Result<()> {
        let jobs = self.inner.store.get_jobs_for_pipeline_run(run_id).await?;
        if jobs.iter().any(|j| !j.status.is_terminal()) {
            return Ok(());
        }
        let status = if jobs.iter().any(|j| j.status == JobStatus::Failure) {
            PipelineRunStatus::Failure
        } else {
            PipelineRunStatus::Success
        };
        self.inner.dags.lock().await.remove(&run_id);
        self.inner.store.update_run_status(run_id, status, Utc::now()).await?;
        Ok(())
    }

    /// Startup reconciliation: any job left `running` by a prior
    /// process (no live driver holds its future) is failed with a
    /// reason marker.
    pub async fn reconcile_orphans(&self) -> Result<usize> {
        let orphaned_runs = self
            .inner
            .store
            .list_runs(RunFilter {
                project_id: None,
                status: Some(PipelineRunStatus::Running),
                limit: None,
            })
            .await?;

        let mut reconciled = 0;
        for run in orphaned_runs {
            let jobs = self.inner.store.get_jobs_for_pipeline_run(run.id).await?;
            for job in jobs.into_iter().filter(|j| j.status == JobStatus::Running) {
                if self
                    .inner
                    .store
                    .update_job_status(
                        &job.id,
                        JobStatus::Running,
                        JobStatus::Failure,
                        Utc::now(),
                        Some("orphaned: left running by a prior process"),
                    )
                    .await
                    .is_ok()
                {
                    reconciled += 1;
                    info!(job_id = %job.id, "reconciled orphaned running job");
                }
            }
            self.maybe_finish_run(run.id).await?;
        }
        Ok(reconciled)
    }

    /// Starts the driver loop; runs until [`Scheduler::stop`] is
    /// called. Intended to be spawned onto its own task by the caller.
    pub async fn run(&self) {
        self.inner.running.store(true, Ordering::SeqCst);
        if let Err(err) = self.reconcile_orphans().await {
            warn!(error = %err, "startup reconciliation failed");
        }
        while self.inner.running.load(Ordering::SeqCst) {
            if let Err(err) = self.tick().await {
                warn!(error = %err, "scheduler tick failed");
            }
            tokio::time::sleep(self.inner.config.poll_interval).await;
        }
    }

    /// `stop()` (§4.5): stop polling and await every in-flight job.
    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        let mut active_jobs = self.inner.active_jobs.lock().await;
        for (_, handle) in active_jobs.drain() {
            let _ = handle.await;
        }
    }

    pub async fn active_job_count(&self) -> usize {
        self.inner.active_jobs.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use zephyr_config::model::{JobDef, PipelineDef, StepDef, TriggerDef};
    use zephyr_core::entities::TriggerType;
    use zephyr_core::metrics::InMemoryMetricsSink;
    use zephyr_store::{JobStore, MemoryStore, PipelineRunStore};

    use super::*;

    fn config_provider(pipeline: PipelineDef) -> ConfigProvider {
        Arc::new(move |_project_id| Ok(PipelineSource::Static(vec![pipeline.clone()])))
    }

    fn scheduler(pipeline: PipelineDef) -> (Scheduler, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let scheduler = Scheduler::new(
            store.clone(),
            None,
            Arc::new(InMemoryMetricsSink::new()),
            Arc::new(ObserverBus::new()),
            config_provider(pipeline),
            SchedulerConfig {
                max_concurrent: 4,
                poll_interval: Duration::from_millis(1),
            },
        );
        (scheduler, store)
    }

    async fn ticks_until_settled(scheduler: &Scheduler, run_id: ResourceId, store: &MemoryStore) {
        for _ in 0..20 {
            scheduler.tick().await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
            let jobs = store.get_jobs_for_pipeline_run(run_id).await.unwrap();
            if jobs.iter().all(|j| j.status.is_terminal()) {
                return;
            }
        }
        panic!("jobs for run {run_id} never settled");
    }

    #[tokio::test]
    async fn linear_chain_runs_in_dependency_order_and_succeeds() {
        let mut build = JobDef::new("build", "alpine:latest");
        build.steps.push(StepDef::run("build", "true"));
        let mut test = JobDef::new("test", "alpine:latest");
        test.depends_on.push("build".to_string());
        test.steps.push(StepDef::run("test", "true"));
        let mut deploy = JobDef::new("deploy", "alpine:latest");
        deploy.depends_on.push("test".to_string());
        deploy.steps.push(StepDef::run("deploy", "true"));

        let mut pipeline = PipelineDef::new("ci");
        pipeline.triggers.push(TriggerDef { trigger_type: TriggerType::Manual, branches: vec![] });
        pipeline.jobs = vec![build, test, deploy];

        let (scheduler, store) = scheduler(pipeline);
        let project_id = ResourceId::new();
        let run_id = scheduler
            .queue_pipeline_run(
                project_id,
                "ci",
                TriggerContext {
                    trigger_type: Some(TriggerType::Manual),
                    ..Default::default()
                },
                None,
                None,
            )
            .await
            .unwrap();

        ticks_until_settled(&scheduler, run_id, &store).await;

        let jobs = store.get_jobs_for_pipeline_run(run_id).await.unwrap();
        assert_eq!(jobs.len(), 3);
        assert!(jobs.iter().all(|j| j.status == JobStatus::Success));

        let build_job = jobs.iter().find(|j| j.name == "build").unwrap();
        let test_job = jobs.iter().find(|j| j.name == "test").unwrap();
        let deploy_job = jobs.iter().find(|j| j.name == "deploy").unwrap();
        assert!(build_job.finished_at.unwrap() <= test_job.started_at.unwrap());
        assert!(test_job.finished_at.unwrap() <= deploy_job.started_at.unwrap());

        let run = store.get_run(run_id).await.unwrap();
        assert_eq!(run.status, PipelineRunStatus::Success);
    }

    #[tokio::test]
    async fn diamond_with_failing_branch_skips_descendant_in_store() {
        let mut a = JobDef::new("a", "alpine:latest");
        a.steps.push(StepDef::run("a", "true"));
        let mut b = JobDef::new("b", "alpine:latest");
        b.depends_on.push("a".to_string());
        b.steps.push(StepDef::run("b", "false"));
        let mut c = JobDef::new("c", "alpine:latest");
        c.depends_on.push("a".to_string());
        c.steps.push(StepDef::run("c", "true"));
        let mut d = JobDef::new("d", "alpine:latest");
        d.depends_on.push("b".to_string());
        d.depends_on.push("c".to_string());
        d.steps.push(StepDef::run("d", "true"));

        let mut pipeline = PipelineDef::new("ci");
        pipeline.triggers.push(TriggerDef { trigger_type: TriggerType::Manual, branches: vec![] });
        pipeline.jobs = vec![a, b, c, d];

        let (scheduler, store) = scheduler(pipeline);
        let project_id = ResourceId::new();
        let run_id = scheduler
            .queue_pipeline_run(
                project_id,
                "ci",
                TriggerContext {
                    trigger_type: Some(TriggerType::Manual),
                    ..Default::default()
                },
                None,
                None,
            )
            .await
            .unwrap();

        ticks_until_settled(&scheduler, run_id, &store).await;

        let jobs = store.get_jobs_for_pipeline_run(run_id).await.unwrap();
        let by_name = |name: &str| jobs.iter().find(|j| j.name == name).unwrap();
        assert_eq!(by_name("a").status, JobStatus::Success);
        assert_eq!(by_name("b").status, JobStatus::Failure);
        assert_eq!(by_name("c").status, JobStatus::Success);
        assert_eq!(
            by_name("d").status,
            JobStatus::Skipped,
            "d must be skipped in the store, not left pending, once its DAG-only skip is cascaded"
        );

        let run = store.get_run(run_id).await.unwrap();
        assert_eq!(run.status, PipelineRunStatus::Failure);
    }

    #[tokio::test]
    async fn reconcile_orphans_fails_running_jobs_left_by_a_prior_process() {
        let mut build = JobDef::new("build", "alpine:latest");
        build.steps.push(StepDef::run("build", "true"));
        let mut pipeline = PipelineDef::new("ci");
        pipeline.triggers.push(TriggerDef { trigger_type: TriggerType::Manual, branches: vec![] });
        pipeline.jobs = vec![build];

        let (scheduler, store) = scheduler(pipeline);
        let project_id = ResourceId::new();
        let run_id = scheduler
            .queue_pipeline_run(
                project_id,
                "ci",
                TriggerContext {
                    trigger_type: Some(TriggerType::Manual),
                    ..Default::default()
                },
                None,
                None,
            )
            .await
            .unwrap();
        store
            .update_run_status(run_id, PipelineRunStatus::Running, Utc::now())
            .await
            .unwrap();
        let jobs = store.get_jobs_for_pipeline_run(run_id).await.unwrap();
        store
            .update_job_status(&jobs[0].id, JobStatus::Pending, JobStatus::Running, Utc::now(), None)
            .await
            .unwrap();

        let reconciled = scheduler.reconcile_orphans().await.unwrap();
        assert_eq!(reconciled, 1);

        let job = store.get_job(&jobs[0].id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failure);
        assert!(job.reason.is_some());
        let run = store.get_run(run_id).await.unwrap();
        assert_eq!(run.status, PipelineRunStatus::Failure);
    }
}
