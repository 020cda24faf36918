//! Executes one job's ordered steps: condition gating, environment
//! composition, shell dispatch, stream capture, output extraction,
//! timeouts and cancellation.

pub mod cancel;
pub mod step;

pub use cancel::CancelToken;
pub use step::{run_job, JobExecutionInput, JobOutcome, JobResult, StepOutcome, StepResult};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use zephyr_config::interpolate::InterpolationContext;
    use zephyr_config::model::{JobDef, StepDef};
    use zephyr_core::condition::ConditionContext;
    use zephyr_core::logger::TracingLoggerSink;

    fn input(job: &JobDef) -> JobExecutionInput<'_> {
        JobExecutionInput {
            workdir: std::env::temp_dir(),
            inherited_env: HashMap::new(),
            logger: Arc::new(TracingLoggerSink),
            interpolation: InterpolationContext::default(),
            condition_ctx: ConditionContext::default(),
            cancel: CancelToken::new(),
            job,
        }
    }

    #[tokio::test]
    async fn step_output_feeds_later_step_env() {
        let mut job = JobDef::new("build", "alpine:latest");
        job.steps.push(StepDef::run(
            "build",
            "echo '::set-output name=version::1.2.3'",
        ));
        let mut check = StepDef::run("check", "echo \"VER=$VER\"");
        check
            .env
            .insert("VER".to_string(), "${{ steps.build.outputs.version }}".to_string());
        job.steps.push(check);

        let result = run_job(input(&job)).await;
        assert_eq!(result.outcome, JobOutcome::Success);
        assert_eq!(
            result.steps[0].outputs.get("version"),
            Some(&"1.2.3".to_string())
        );
    }

    #[tokio::test]
    async fn failing_step_skips_subsequent_steps() {
        let mut job = JobDef::new("build", "alpine:latest");
        job.steps.push(StepDef::run("fail", "exit 1"));
        job.steps.push(StepDef::run("after", "echo should not run"));

        let result = run_job(input(&job)).await;
        assert_eq!(result.outcome, JobOutcome::Failure);
        assert_eq!(result.steps[0].outcome, StepOutcome::Failure);
        assert_eq!(result.steps[1].outcome, StepOutcome::Skipped);
    }

    #[tokio::test]
    async fn continue_on_error_lets_job_keep_going() {
        let mut job = JobDef::new("build", "alpine:latest");
        let mut fail_step = StepDef::run("fail", "exit 1");
        fail_step.continue_on_error = true;
        job.steps.push(fail_step);
        job.steps.push(StepDef::run("after", "echo ok"));

        let result = run_job(input(&job)).await;
        assert_eq!(result.outcome, JobOutcome::Success);
        assert_eq!(result.steps[0].outcome, StepOutcome::Failure);
        assert_eq!(result.steps[0].status, StepOutcome::Success);
        assert_eq!(result.steps[1].outcome, StepOutcome::Success);
    }

    #[tokio::test]
    async fn step_timeout_is_enforced() {
        let mut job = JobDef::new("build", "alpine:latest");
        let mut slow = StepDef::run("slow", "sleep 5");
        slow.timeout_secs = Some(1);
        job.steps.push(slow);

        let result = run_job(input(&job)).await;
        assert_eq!(result.steps[0].outcome, StepOutcome::Failure);
        assert_eq!(result.steps[0].exit_code, Some(124));
        assert!(result.steps[0].output.contains("[TIMEOUT]"));
    }
}
