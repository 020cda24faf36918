//! Application state: the shared handles every route closes over.

use std::sync::Arc;

use zephyr_core::metrics::InMemoryMetricsSink;
use zephyr_scheduler::{ObserverBus, Scheduler};
use zephyr_store::Store;

/// Shared application state, cheaply cloneable (every field is already
/// an `Arc` or a handle that is itself cheap to clone).
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub scheduler: Scheduler,
    pub observer: Arc<ObserverBus>,
    pub metrics: Arc<InMemoryMetricsSink>,
    /// When set, `/api/v1/*` requires a matching `X-API-Key` or
    /// `Authorization: Bearer` header. `None` disables the check, for
    /// local development.
    pub api_key: Option<String>,
    pub webhook_secrets: Arc<std::collections::HashMap<String, String>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        scheduler: Scheduler,
        observer: Arc<ObserverBus>,
        metrics: Arc<InMemoryMetricsSink>,
        api_key: Option<String>,
        webhook_secrets: std::collections::HashMap<String, String>,
    ) -> Self {
        Self {
            store,
            scheduler,
            observer,
            metrics,
            api_key,
            webhook_secrets: Arc::new(webhook_secrets),
        }
    }
}
