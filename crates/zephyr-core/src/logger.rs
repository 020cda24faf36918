//! Logger capability interface.
//!
//! The step executor forwards captured step output through a sink that
//! is injected by construction rather than read off a global logger —
//! so a caller can choose between ambient `tracing` output (local/CLI
//! runs) and persisting each line as a [`crate::entities::LogRecord`]
//! (the scheduler, via the store). Ambient operational logging elsewhere
//! in the codebase still uses `tracing`'s macros directly; this trait
//! exists only for the step output/log-record data path.

pub trait LoggerSink: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    /// Open a named group (e.g. a step name) for nested output.
    fn group(&self, name: &str);
    fn group_end(&self);
}

/// Forwards to `tracing`. Used by the CLI's local-run mode and by tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLoggerSink;

impl LoggerSink for TracingLoggerSink {
    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }

    fn group(&self, name: &str) {
        tracing::info!(group = %name, "group start");
    }

    fn group_end(&self) {
        tracing::info!("group end");
    }
}
