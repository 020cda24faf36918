//! Unified error type for Zephyr.
//!
//! Crate-local error types (`PlannerError`, `PoolError`, `DbError`, ...)
//! convert into this one via `#[from]` at the boundary where a caller
//! needs the unified type (the scheduler driver loop, the API layer).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Pipeline configuration failed validation (planner).
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A dependency cycle was found while building a DAG.
    #[error("cyclic dependency involving {0}")]
    CyclicDependency(String),

    /// An operation was attempted from a state that does not permit it.
    #[error("illegal transition: {0}")]
    IllegalTransition(String),

    /// The warm pool has no idle capacity and is at `maxTotal`.
    #[error("pool exhausted")]
    PoolExhausted,

    /// The hypervisor driver failed to create, start, or destroy a VM.
    #[error("hypervisor failure: {0}")]
    HypervisorFailure(String),

    /// Network resource allocation (TAP device, subnet, ...) failed.
    #[error("network allocation failure: {0}")]
    NetworkAllocFailure(String),

    /// A step exited with a non-zero code.
    #[error("step failed: {0}")]
    StepFailure(String),

    /// A step exceeded its configured timeout.
    #[error("step timed out after {0:?}")]
    StepTimeout(std::time::Duration),

    /// A compare-and-swap on stored state lost the race.
    #[error("store conflict: {0}")]
    StoreConflict(String),

    #[error("unauthorised: {0}")]
    Unauthorised(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
