//! Builds the embedded pipeline definition the `run`/`validate`
//! commands drive.
//!
//! Reading and parsing a project's on-disk configuration is a separate
//! concern not wired up here, so this stands in for it with a plain
//! struct literal, the same way `zephyr_config::model`'s own
//! `PipelineDef::new`/`JobDef::new` build values directly rather than
//! through a parser.

use zephyr_config::model::{JobDef, PipelineDef, StepDef, TriggerDef};
use zephyr_core::entities::TriggerType;

pub fn pipeline() -> PipelineDef {
    let mut build = JobDef::new("build", "alpine:latest");
    build.steps.push(StepDef::run("compile", "echo building"));

    let mut test = JobDef::new("test", "alpine:latest");
    test.depends_on.push("build".to_string());
    test.steps.push(StepDef::run("unit", "echo testing"));

    let mut deploy = JobDef::new("deploy", "alpine:latest");
    deploy.depends_on.push("test".to_string());
    deploy.steps.push(StepDef::run("publish", "echo deploying"));

    let mut pipeline = PipelineDef::new("ci");
    pipeline.triggers.push(TriggerDef {
        trigger_type: TriggerType::Manual,
        branches: vec![],
    });
    pipeline.jobs = vec![build, test, deploy];
    pipeline
}
