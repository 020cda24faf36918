//! The job scheduler: turns queued pipeline runs into executed jobs and
//! fans out their progress to subscribers.

pub mod observer;
pub mod scheduler;
pub mod store_logger;

pub use observer::{JobEvent, ObserverBus, Subscriber};
pub use scheduler::{ConfigProvider, Scheduler, SchedulerConfig};
pub use store_logger::StoreLoggerSink;
