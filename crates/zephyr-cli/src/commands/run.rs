//! `zephyr run`: drives a pipeline straight through the planner and
//! `zephyr_planner::Dag`, synchronously and in topological order,
//! without `zephyr_scheduler::Scheduler`'s polling loop — the §6 CLI
//! contract ("a trivial store that executes jobs synchronously").

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use zephyr_config::interpolate::InterpolationContext;
use zephyr_config::model::PipelineDef;
use zephyr_core::condition::ConditionContext;
use zephyr_core::entities::{JobStatus, TriggerType};
use zephyr_core::id::{JobId, ResourceId};
use zephyr_core::logger::TracingLoggerSink;
use zephyr_core::metrics::InMemoryMetricsSink;
use zephyr_executor::{run_job, CancelToken, JobExecutionInput, JobOutcome};
use zephyr_planner::{expand_matrix, resolve_pipelines, validate_pipeline, Dag, JobNode};
use zephyr_pool::fakes::{FakeHypervisorDriver, FakeNetworkAllocator};
use zephyr_pool::{PoolConfig, WarmPool};
use zephyr_store::{JobStore, MemoryStore, PipelineRunStore, ProjectStore, Store};

use crate::commands::demo;

pub struct RunArgs {
    pub pipeline: Option<String>,
    pub job: Option<String>,
    pub config: Option<String>,
    pub local_shell: bool,
}

/// Jobs reachable from `target` by following `depends_on` backwards,
/// including `target` itself — the subgraph a `--job` filter needs to
/// run, computed before matrix expansion over the unexpanded job
/// names.
fn dependency_closure(pipeline: &PipelineDef, target: &str) -> HashSet<String> {
    let by_name: HashMap<&str, &[String]> = pipeline
        .jobs
        .iter()
        .map(|j| (j.name.as_str(), j.depends_on.as_slice()))
        .collect();

    let mut closure = HashSet::new();
    let mut stack = vec![target.to_string()];
    while let Some(name) = stack.pop() {
        if !closure.insert(name.clone()) {
            continue;
        }
        if let Some(deps) = by_name.get(name.as_str()) {
            stack.extend(deps.iter().cloned());
        }
    }
    closure
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    if let Some(config) = &args.config {
        if !Path::new(config).exists() {
            eprintln!("config file not found: {config}");
            std::process::exit(1);
        }
    }

    let mut pipeline = demo::pipeline();
    if let Some(name) = &args.pipeline {
        if &pipeline.name != name {
            eprintln!("unknown pipeline: {name}");
            std::process::exit(1);
        }
    }
    if let Some(job) = &args.job {
        let closure = dependency_closure(&pipeline, job);
        if !closure.contains(job.as_str()) {
            eprintln!("unknown job: {job}");
            std::process::exit(1);
        }
        pipeline.jobs.retain(|j| closure.contains(&j.name));
    }

    if let Err(err) = validate_pipeline(&pipeline) {
        eprintln!("invalid pipeline: {err}");
        std::process::exit(1);
    }

    let store = MemoryStore::new();
    let project = store.create_project("local", None, "embedded").await?;
    let run = store
        .create_run(
            project.id,
            &pipeline.name,
            TriggerType::Manual,
            serde_json::json!({}),
            None,
            None,
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
            store
                .create_job(id.clone(), run.id, &instance.job_name, &instance.def.runner_image, depends_on.clone())
                .await?;
            nodes.push(JobNode::new(id, instance.job_name.as_str(), depends_on));
        }
    }

    let mut dag = Dag::build(nodes)?;

    let pool = if args.local_shell {
        None
    } else {
        let pool = WarmPool::new(
            PoolConfig {
                min_idle: 1,
                max_idle: 2,
                max_total: 4,
                max_idle_time: Duration::from_secs(60),
                health_check_interval: Duration::from_secs(3600),
                kernel: "vmlinux".to_string(),
                rootfs: "rootfs.ext4".to_string(),
                cpu: 1,
                memory_mb: 256,
            },
            Arc::new(FakeHypervisorDriver::default()),
            Arc::new(FakeNetworkAllocator::default()),
            Arc::new(InMemoryMetricsSink::new()),
        );
        pool.start().await?;
        Some(pool)
    };

    let logger = Arc::new(TracingLoggerSink);
    let mut failed_jobs = Vec::new();
    let mut summary = Vec::new();

    for id in dag.topological_order() {
        let status = dag.get(&id).map(|n| n.status).unwrap_or(JobStatus::Skipped);
        match status {
            JobStatus::Skipped => {
                println!("⊘ {id} (skipped: an upstream job failed)");
                store
                    .update_job_status(
                        &id,
                        JobStatus::Pending,
                        JobStatus::Skipped,
                        chrono::Utc::now(),
                        Some("upstream job failed"),
                    )
                    .await?;
                summary.push((id.clone(), JobStatus::Skipped));
                continue;
            }
            JobStatus::Ready => {}
            // A topological walk only ever hands us a node whose deps
            // already ran, so every other node is Ready or Skipped.
            other => unreachable!("job {id} reached as {other:?} out of topological order"),
        }

        let job = store.get_job(&id).await?;
        let job_def = pipeline
            .jobs
            .iter()
            .find(|j| j.name == job.name)
            .expect("job present in expanded pipeline");

        println!("▶ {id}");
        dag.mark_running(&id)?;
        store
            .update_job_status(&id, JobStatus::Pending, JobStatus::Running, chrono::Utc::now(), None)
            .await?;

        let vm = match &pool {
            Some(pool) => match pool.acquire().await {
                Ok(vm) => Some(vm),
                Err(err) => {
                    let reason = format!("failed to acquire a VM: {err}");
                    println!("✗ {id} ({reason})");
                    store
                        .update_job_status(
                            &id,
                            JobStatus::Running,
                            JobStatus::Failure,
                            chrono::Utc::now(),
                            Some(&reason),
                        )
                        .await?;
                    dag.mark_completed(&id, false)?;
                    failed_jobs.push(id.clone());
                    summary.push((id, JobStatus::Failure));
                    continue;
                }
            },
            None => None,
        };

        let workdir = std::env::temp_dir().join(id.as_str().replace(':', "_"));
        tokio::fs::create_dir_all(&workdir).await?;

        let result = run_job(JobExecutionInput {
            workdir,
            inherited_env: pipeline.env.clone(),
            logger: logger.clone(),
            interpolation: InterpolationContext::default(),
            condition_ctx: ConditionContext::default(),
            cancel: CancelToken::new(),
            job: job_def,
        })
        .await;

        if let (Some(pool), Some((handle, _network))) = (&pool, vm) {
            pool.release(&handle.id, false).await?;
        }

        let success = result.outcome == JobOutcome::Success;
        let new_status = if success { JobStatus::Success } else { JobStatus::Failure };
        let reason = (!success).then(|| result.failure_reason().unwrap_or_else(|| "job failed".to_string()));
        store.set_job_outputs(&id, result.outputs()).await?;
        store
            .update_job_status(&id, JobStatus::Running, new_status, chrono::Utc::now(), reason.as_deref())
            .await?;
        dag.mark_completed(&id, success)?;

        if success {
            println!("✓ {id}");
        } else {
            println!("✗ {id}");
            failed_jobs.push(id.clone());
        }
        summary.push((id, new_status));
    }

    if let Some(pool) = pool {
        pool.stop().await;
    }

    println!("\nsummary:");
    for (id, status) in &summary {
        println!("  {id}: {status:?}");
    }

    if failed_jobs.is_empty() {
        Ok(())
    } else {
        eprintln!("pipeline failed: {} job(s) did not succeed", failed_jobs.len());
        std::process::exit(1);
    }
}
