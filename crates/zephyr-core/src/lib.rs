//! Core domain types and capability traits for the Zephyr CI orchestrator.
//!
//! This crate contains:
//! - Resource identifiers and persistent entity types (`Project`,
//!   `PipelineRun`, `Job`, `LogRecord`, `WebhookDelivery`).
//! - The unified error type.
//! - The `MetricsSink` and `LoggerSink` capability traits.
//! - The `HypervisorDriver` / `NetworkAllocator` traits the warm pool
//!   drives.
//! - The condition-expression evaluator shared by the planner and the
//!   step executor.

pub mod condition;
pub mod entities;
pub mod error;
pub mod hypervisor;
pub mod id;
pub mod logger;
pub mod metrics;

pub use error::{Error, Result};
pub use id::{JobId, ResourceId};
