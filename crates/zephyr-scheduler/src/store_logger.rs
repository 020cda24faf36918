//! Bridges the step executor's [`LoggerSink`] to the store's append-only
//! log table, so captured step output survives past the process that
//! produced it — the local/CLI run mode instead points a step at
//! [`zephyr_core::logger::TracingLoggerSink`].

use std::sync::Arc;

use zephyr_core::entities::LogStream;
use zephyr_core::id::JobId;
use zephyr_core::logger::LoggerSink;

use zephyr_store::Store;

pub struct StoreLoggerSink {
    store: Arc<dyn Store>,
    job_id: JobId,
    runtime: tokio::runtime::Handle,
}

impl StoreLoggerSink {
    pub fn new(store: Arc<dyn Store>, job_id: JobId) -> Self {
        Self {
            store,
            job_id,
            runtime: tokio::runtime::Handle::current(),
        }
    }

    fn append(&self, stream: LogStream, message: &str) {
        let store = self.store.clone();
        let job_id = self.job_id.clone();
        let message = message.to_string();
        self.runtime.spawn(async move {
            let _ = store.append_log(&job_id, stream, &message).await;
        });
    }
}

impl LoggerSink for StoreLoggerSink {
    fn debug(&self, message: &str) {
        self.append(LogStream::Stdout, message);
    }

    fn info(&self, message: &str) {
        self.append(LogStream::Stdout, message);
    }

    fn warn(&self, message: &str) {
        self.append(LogStream::Stderr, message);
    }

    fn error(&self, message: &str) {
        self.append(LogStream::Stderr, message);
    }

    fn group(&self, name: &str) {
        self.append(LogStream::Stdout, &format!("::group::{name}"));
    }

    fn group_end(&self) {
        self.append(LogStream::Stdout, "::endgroup::");
    }
}
