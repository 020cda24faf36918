//! HTTP/WS edge for the Zephyr CI orchestrator.
//!
//! Provides the REST surface over the store/scheduler, a job-scoped
//! WebSocket feed, and the generalised inbound webhook endpoint.

pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
