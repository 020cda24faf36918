//! Pure transformation from a validated pipeline configuration plus a
//! trigger context into a concrete list of expanded jobs, plus the
//! in-memory DAG engine that drives those jobs to completion.

pub mod dag;
pub mod matrix;

use std::collections::HashSet;

use zephyr_config::model::{PipelineDef, PipelineSource};
use zephyr_config::{ConfigError, ConfigResult, TriggerContext};

pub use dag::{Dag, JobNode};
pub use matrix::{expand_matrix, ExpandedJob, MatrixCombination};

/// If `pipelines` is a concrete list, return it unchanged; if it is a
/// computation, invoke it with the trigger context and return its
/// result. Identity for the static case.
pub fn resolve_pipelines(source: &PipelineSource, ctx: &TriggerContext) -> Vec<PipelineDef> {
    match source {
        PipelineSource::Static(pipelines) => pipelines.clone(),
        PipelineSource::Dynamic(f) => f(ctx),
    }
}

/// Validate a pipeline definition's structural invariants. Does not
/// inspect matrix contents — that's `expand_matrix`'s job.
pub fn validate_pipeline(pipeline: &PipelineDef) -> ConfigResult<()> {
    if pipeline.name.trim().is_empty() {
        return Err(ConfigError::EmptyPipelineName);
    }
    if pipeline.triggers.is_empty() {
        return Err(ConfigError::NoTriggers(pipeline.name.clone()));
    }
    if pipeline.jobs.is_empty() {
        return Err(ConfigError::NoJobs(pipeline.name.clone()));
    }

    let mut seen = HashSet::new();
    for job in &pipeline.jobs {
        if !seen.insert(job.name.as_str()) {
            return Err(ConfigError::DuplicateJob {
                pipeline: pipeline.name.clone(),
                job: job.name.clone(),
            });
        }
    }

    let job_names: HashSet<&str> = pipeline.jobs.iter().map(|j| j.name.as_str()).collect();
    for job in &pipeline.jobs {
        for dependency in &job.depends_on {
            if !job_names.contains(dependency.as_str()) {
                return Err(ConfigError::UnknownDependency {
                    job: job.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
        if job.runner_image.trim().is_empty() {
            return Err(ConfigError::MissingRunnerImage(job.name.clone()));
        }
        if job.steps.is_empty() {
            return Err(ConfigError::NoSteps(job.name.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zephyr_config::model::JobDef;

    #[test]
    fn resolve_static_is_identity() {
        let pipelines = vec![PipelineDef::new("ci")];
        let source = PipelineSource::Static(pipelines.clone());
        let ctx = TriggerContext::default();
        let resolved = resolve_pipelines(&source, &ctx);
        assert_eq!(resolved.len(), pipelines.len());
        assert_eq!(resolved[0].name, pipelines[0].name);
    }

    #[test]
    fn resolve_dynamic_invokes_closure() {
        let source = PipelineSource::Dynamic(std::sync::Arc::new(|ctx: &TriggerContext| {
            vec![PipelineDef::new(ctx.event_type.clone())]
        }));
        let ctx = TriggerContext {
            event_type: "push".to_string(),
            ..Default::default()
        };
        let resolved = resolve_pipelines(&source, &ctx);
        assert_eq!(resolved[0].name, "push");
    }

    fn valid_job(name: &str) -> JobDef {
        let mut job = JobDef::new(name, "alpine:latest");
        job.steps.push(zephyr_config::model::StepDef::run("step1", "echo hi"));
        job
    }

    fn valid_pipeline() -> PipelineDef {
        let mut pipeline = PipelineDef::new("ci");
        pipeline.triggers.push(zephyr_config::model::TriggerDef {
            trigger_type: zephyr_core::entities::TriggerType::Push,
            branches: vec![],
        });
        pipeline.jobs.push(valid_job("build"));
        pipeline
    }

    #[test]
    fn valid_pipeline_passes() {
        assert!(validate_pipeline(&valid_pipeline()).is_ok());
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut pipeline = valid_pipeline();
        pipeline.name = "  ".to_string();
        assert!(matches!(
            validate_pipeline(&pipeline),
            Err(ConfigError::EmptyPipelineName)
        ));
    }

    #[test]
    fn duplicate_job_names_are_rejected() {
        let mut pipeline = valid_pipeline();
        pipeline.jobs.push(valid_job("build"));
        assert!(matches!(
            validate_pipeline(&pipeline),
            Err(ConfigError::DuplicateJob { .. })
        ));
    }

    #[test]
    fn dangling_dependency_is_rejected() {
        let mut pipeline = valid_pipeline();
        let mut job = valid_job("test");
        job.depends_on.push("ghost".to_string());
        pipeline.jobs.push(job);
        assert!(matches!(
            validate_pipeline(&pipeline),
            Err(ConfigError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn job_without_steps_is_rejected() {
        let mut pipeline = valid_pipeline();
        pipeline.jobs.push(JobDef::new("empty", "alpine:latest"));
        assert!(matches!(
            validate_pipeline(&pipeline),
            Err(ConfigError::NoSteps(_))
        ));
    }
}
