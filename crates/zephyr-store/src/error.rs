//! Store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A `updateJobStatus` compare-and-swap lost the race: the stored
    /// status no longer matched the expected prior status.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for zephyr_core::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => zephyr_core::Error::NotFound(msg),
            StoreError::Conflict(msg) => zephyr_core::Error::StoreConflict(msg),
            StoreError::Database(err) => zephyr_core::Error::Internal(err.to_string()),
        }
    }
}
