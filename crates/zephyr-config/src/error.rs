//! Configuration validation errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("pipeline name must not be empty")]
    EmptyPipelineName,

    #[error("pipeline {0:?} has no triggers")]
    NoTriggers(String),

    #[error("pipeline {0:?} has no jobs")]
    NoJobs(String),

    #[error("duplicate job name {job:?} in pipeline {pipeline:?}")]
    DuplicateJob { pipeline: String, job: String },

    #[error("job {job:?} depends on unknown job {dependency:?}")]
    UnknownDependency { job: String, dependency: String },

    #[error("job {0:?} has no runner image")]
    MissingRunnerImage(String),

    #[error("job {0:?} has no steps")]
    NoSteps(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl From<ConfigError> for zephyr_core::Error {
    fn from(err: ConfigError) -> Self {
        zephyr_core::Error::InvalidConfig(err.to_string())
    }
}
