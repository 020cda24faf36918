//! Runs one job's ordered steps to a terminal result.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use zephyr_config::interpolate::InterpolationContext;
use zephyr_config::model::{JobDef, StepDef, StepKind};
use zephyr_core::condition::ConditionContext;
use zephyr_core::entities::LogStream;
use zephyr_core::logger::LoggerSink;

static SET_OUTPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"::set-output name=([A-Za-z0-9_.-]+)::(.*)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failure,
    Skipped,
}

/// `status` differs from `outcome` exactly when a failed step has
/// `continueOnError`: `outcome` stays `Failure` but `status` reports
/// `Success` so the job doesn't fail because of it.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub id: String,
    pub outcome: StepOutcome,
    pub status: StepOutcome,
    pub exit_code: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outputs: HashMap<String, String>,
    pub output: String,
}

impl StepResult {
    fn skipped(id: &str) -> Self {
        Self {
            id: id.to_string(),
            outcome: StepOutcome::Skipped,
            status: StepOutcome::Skipped,
            exit_code: None,
            started_at: None,
            finished_at: None,
            outputs: HashMap::new(),
            output: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub outcome: JobOutcome,
    pub steps: Vec<StepResult>,
}

impl JobResult {
    pub fn outputs(&self) -> HashMap<String, String> {
        let mut all = HashMap::new();
        for step in &self.steps {
            for (k, v) in &step.outputs {
                all.insert(format!("{}.{}", step.id, k), v.clone());
            }
        }
        all
    }

    /// A reason marker for a failed job: names the first step whose
    /// failure wasn't absorbed by `continueOnError`.
    pub fn failure_reason(&self) -> Option<String> {
        self.steps
            .iter()
            .find(|step| step.status == StepOutcome::Failure)
            .map(|step| match step.exit_code {
                Some(code) => format!("step {} exited with code {code}", step.id),
                None => format!("step {} failed", step.id),
            })
    }
}

/// Everything `run_job` needs beyond the job definition itself.
pub struct JobExecutionInput<'a> {
    pub workdir: PathBuf,
    pub inherited_env: HashMap<String, String>,
    pub logger: Arc<dyn LoggerSink>,
    pub interpolation: InterpolationContext,
    pub condition_ctx: ConditionContext,
    pub cancel: crate::cancel::CancelToken,
    pub job: &'a JobDef,
}

pub async fn run_job(input: JobExecutionInput<'_>) -> JobResult {
    let JobExecutionInput {
        workdir,
        inherited_env,
        logger,
        mut interpolation,
        mut condition_ctx,
        cancel,
        job,
    } = input;

    let mut results = Vec::with_capacity(job.steps.len());
    let mut job_failing = false;

    // Carries `PATH` (and any other vars) that `setup` steps provision
    // for the steps after them. Seeded from the inherited `PATH` so a
    // job with no `setup` steps sees no change in behaviour.
    let mut runtime_env: HashMap<String, String> = HashMap::new();
    if let Some(path) = inherited_env.get("PATH") {
        runtime_env.insert("PATH".to_string(), path.clone());
    }

    for step in &job.steps {
        if cancel.is_cancelled() {
            results.push(StepResult::skipped(&step.id));
            continue;
        }

        // Condition gate.
        if let Some(condition) = &step.condition {
            match condition.evaluate(&condition_ctx) {
                Ok(true) => {}
                Ok(false) => {
                    results.push(StepResult::skipped(&step.id));
                    continue;
                }
                Err(err) => {
                    logger.warn(&format!("step {} condition error: {err}", step.id));
                    results.push(StepResult::skipped(&step.id));
                    continue;
                }
            }
        }

        // Failure gate.
        if job_failing && !step.continue_on_error {
            results.push(StepResult::skipped(&step.id));
            continue;
        }

        let result = run_step(
            step,
            job,
            &workdir,
            &inherited_env,
            &mut runtime_env,
            &interpolation,
            logger.as_ref(),
            &cancel,
        )
        .await;

        if result.outcome == StepOutcome::Failure && !step.continue_on_error {
            job_failing = true;
        }

        let mut step_outputs = HashMap::new();
        step_outputs.insert(step.id.clone(), result.outputs.clone());
        interpolation.steps.extend(step_outputs);
        condition_ctx.steps.insert(
            step.id.clone(),
            match result.outcome {
                StepOutcome::Success => "success".to_string(),
                StepOutcome::Failure => "failure".to_string(),
                StepOutcome::Skipped => "skipped".to_string(),
            },
        );

        results.push(result);
    }

    let outcome = if results
        .iter()
        .any(|r| r.outcome == StepOutcome::Failure && r.status == StepOutcome::Failure)
    {
        JobOutcome::Failure
    } else {
        JobOutcome::Success
    };

    JobResult {
        outcome,
        steps: results,
    }
}

async fn run_step(
    step: &StepDef,
    job: &JobDef,
    job_workdir: &Path,
    inherited_env: &HashMap<String, String>,
    runtime_env: &mut HashMap<String, String>,
    interpolation: &InterpolationContext,
    logger: &dyn LoggerSink,
    cancel: &crate::cancel::CancelToken,
) -> StepResult {
    logger.group(&step.id);

    // Environment composition: job env, then step env, then the fixed
    // CI markers, then matrix-derived MATRIX_* vars, then whatever
    // earlier `setup` steps provisioned (e.g. a widened `PATH`). Later
    // sources win.
    let mut env = inherited_env.clone();
    env.extend(job.env.clone());
    env.extend(step.env.clone());
    env.insert("CI".to_string(), "true".to_string());
    env.insert("ZEPHYR".to_string(), "true".to_string());
    env.extend(interpolation.matrix_env());
    env.extend(runtime_env.clone());
    let env = interpolation.interpolate_map(&env);

    let workdir = match &step.workdir {
        Some(dir) if Path::new(dir).is_absolute() => PathBuf::from(dir),
        Some(dir) => job_workdir.join(dir),
        None => job_workdir.to_path_buf(),
    };

    let result = match step.kind {
        StepKind::Setup => run_setup(step, job_workdir, runtime_env, logger).await,
        StepKind::Run => {
            let command = step
                .command
                .as_deref()
                .map(|c| interpolation.interpolate(c))
                .unwrap_or_default();
            run_command(step, &command, &workdir, &env, logger, cancel).await
        }
    };

    logger.group_end();
    result
}

/// Provisions `{runtime, version}` onto `PATH` for every step after this
/// one: creates a marker file under a runtime-scoped directory in the
/// job's working directory and prepends that directory's `bin/` onto
/// `runtime_env`'s `PATH`, which `run_step` folds into each subsequent
/// step's environment.
async fn run_setup(
    step: &StepDef,
    job_workdir: &Path,
    runtime_env: &mut HashMap<String, String>,
    logger: &dyn LoggerSink,
) -> StepResult {
    let (runtime, version) = step.runtime.clone().unwrap_or_default();
    let runtime_dir = job_workdir.join(".zephyr-runtimes").join(format!("{runtime}-{version}"));
    let bin_dir = runtime_dir.join("bin");

    let provisioned = async {
        tokio::fs::create_dir_all(&bin_dir).await?;
        tokio::fs::write(runtime_dir.join(".ready"), format!("{runtime} {version}\n")).await
    }
    .await;

    let outcome = match provisioned {
        Ok(()) => {
            let existing = runtime_env.get("PATH").cloned().unwrap_or_default();
            let new_path = if existing.is_empty() {
                bin_dir.display().to_string()
            } else {
                format!("{}:{existing}", bin_dir.display())
            };
            runtime_env.insert("PATH".to_string(), new_path);
            logger.info(&format!("provisioned {runtime} {version} onto PATH at {}", bin_dir.display()));
            StepOutcome::Success
        }
        Err(err) => {
            logger.error(&format!("failed to provision {runtime} {version}: {err}"));
            StepOutcome::Failure
        }
    };

    StepResult {
        id: step.id.clone(),
        outcome,
        status: outcome,
        exit_code: if outcome == StepOutcome::Success { Some(0) } else { None },
        started_at: Some(Utc::now()),
        finished_at: Some(Utc::now()),
        outputs: HashMap::new(),
        output: String::new(),
    }
}

async fn run_command(
    step: &StepDef,
    command: &str,
    workdir: &Path,
    env: &HashMap<String, String>,
    logger: &dyn LoggerSink,
    cancel: &crate::cancel::CancelToken,
) -> StepResult {
    let started_at = Utc::now();

    let mut cmd = Command::new(&step.shell);
    cmd.arg("-c")
        .arg(command)
        .current_dir(workdir)
        .envs(env)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            logger.error(&format!("failed to spawn step {}: {err}", step.id));
            return StepResult {
                id: step.id.clone(),
                outcome: StepOutcome::Failure,
                status: StepOutcome::Failure,
                exit_code: None,
                started_at: Some(started_at),
                finished_at: Some(Utc::now()),
                outputs: HashMap::new(),
                output: String::new(),
            };
        }
    };

    let pid = child.id();
    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(LogStream, String)>();
    let stdout_tx = tx.clone();
    let stdout_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if stdout_tx.send((LogStream::Stdout, line)).is_err() {
                break;
            }
        }
    });
    let stderr_tx = tx.clone();
    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if stderr_tx.send((LogStream::Stderr, line)).is_err() {
                break;
            }
        }
    });
    drop(tx);

    // Drain stream lines into a buffer concurrently with waiting for
    // exit, so a silent, slow command still gets timed out.
    let mut output = String::new();
    let mut lines_open = true;

    let wait_future = async {
        match step.timeout_secs {
            Some(timeout_secs) => match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait()).await {
                Ok(result) => Some((result, false)),
                Err(_elapsed) => None,
            },
            None => Some((child.wait().await, false)),
        }
    };
    tokio::pin!(wait_future);

    let exit_status;
    let mut timed_out;
    loop {
        tokio::select! {
            biased;
            maybe_line = rx.recv(), if lines_open => {
                match maybe_line {
                    Some((stream, line)) => {
                        match stream {
                            LogStream::Stdout => logger.info(&line),
                            LogStream::Stderr => logger.warn(&line),
                        }
                        output.push_str(&line);
                        output.push('\n');
                    }
                    None => lines_open = false,
                }
            }
            outcome = &mut wait_future => {
                match outcome {
                    Some((result, _)) => {
                        exit_status = result.ok();
                        timed_out = false;
                    }
                    None => {
                        terminate(pid, logger).await;
                        exit_status = None;
                        timed_out = true;
                    }
                }
                break;
            }
            _ = cancel.cancelled() => {
                terminate(pid, logger).await;
                exit_status = None;
                timed_out = false;
                break;
            }
        }
    }

    // Drain whatever output remains now that the process (and its
    // pipes) has been torn down.
    while let Ok(Some((stream, line))) = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await {
        match stream {
            LogStream::Stdout => logger.info(&line),
            LogStream::Stderr => logger.warn(&line),
        }
        output.push_str(&line);
        output.push('\n');
    }

    let _ = stdout_task.await;
    let _ = stderr_task.await;

    let finished_at = Utc::now();
    let exit_code = if timed_out {
        Some(124)
    } else {
        exit_status.and_then(|s| s.code())
    };

    if timed_out {
        output.push_str("[TIMEOUT] Step exceeded timeout limit\n");
    }

    let outputs = extract_outputs(&output);
    let outcome = if exit_code == Some(0) {
        StepOutcome::Success
    } else {
        StepOutcome::Failure
    };
    let status = if outcome == StepOutcome::Failure && step.continue_on_error {
        StepOutcome::Success
    } else {
        outcome
    };

    StepResult {
        id: step.id.clone(),
        outcome,
        status,
        exit_code,
        started_at: Some(started_at),
        finished_at: Some(finished_at),
        outputs,
        output,
    }
}

/// SIGTERM, then SIGKILL after a grace period, issued via the `kill`
/// binary so no extra signal-handling crate is needed for a one-shot
/// terminate.
async fn terminate(pid: Option<u32>, logger: &dyn LoggerSink) {
    let Some(pid) = pid else { return };
    logger.warn(&format!("terminating pid {pid}"));
    let _ = Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()
        .await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    let _ = Command::new("kill")
        .args(["-KILL", &pid.to_string()])
        .status()
        .await;
}

fn extract_outputs(output: &str) -> HashMap<String, String> {
    let mut outputs = HashMap::new();
    for line in output.lines() {
        if let Some(caps) = SET_OUTPUT.captures(line) {
            outputs.insert(caps[1].to_string(), caps[2].to_string());
        }
    }
    outputs
}
