//! Declarative pipeline configuration model and placeholder interpolation.
//!
//! This crate owns the parsed shape of a project's configuration
//! (`ProjectConfig`, `PipelineDef`, `JobDef`, `StepDef`, `MatrixDef`) and
//! the `${{ ... }}` interpolation used to resolve matrix values, step
//! outputs and dependency outputs into job/step environments. Reading
//! configuration off disk, and validating/expanding it into concrete
//! jobs, are someone else's job.

pub mod error;
pub mod interpolate;
pub mod model;

pub use error::{ConfigError, ConfigResult};
pub use interpolate::InterpolationContext;
pub use model::{
    JobDef, MatrixDef, PipelineDef, PipelineSource, ProjectConfig, StepDef, StepKind, TriggerContext,
    TriggerDef,
};
