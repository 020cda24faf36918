//! Persistence for Zephyr (§6): the store operations the scheduler,
//! the edge, and the CLI all drive through the same traits, backed
//! either by Postgres or by an in-process map.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use traits::{JobStore, LogStore, PipelineRunStore, ProjectStore, RunFilter, Store, WebhookStore};
