//! Observer bus (§4.6): per-job subscriber fan-out. Keyed by job id
//! rather than a single broadcast channel, since a caller subscribes to
//! one job's events rather than filtering a firehose client-side.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use zephyr_core::entities::JobStatus;
use zephyr_core::id::JobId;

#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    pub logs_delta: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub type Subscriber = mpsc::Sender<JobEvent>;

#[derive(Default)]
pub struct ObserverBus {
    subscribers: Mutex<HashMap<JobId, Vec<Subscriber>>>,
}

impl ObserverBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, job_id: JobId, buffer: usize) -> mpsc::Receiver<JobEvent> {
        let (tx, rx) = mpsc::channel(buffer);
        self.subscribers.lock().unwrap().entry(job_id).or_default().push(tx);
        rx
    }

    /// Drop every subscriber registered for `job_id` (used once a job
    /// reaches a terminal state and no further events will be published).
    pub fn unsubscribe_all(&self, job_id: &JobId) {
        self.subscribers.lock().unwrap().remove(job_id);
    }

    /// Deliver `event` to every current subscriber of its job. A
    /// subscriber whose receiver has been dropped is pruned; one
    /// subscriber's failure never stops delivery to the others.
    pub fn publish(&self, event: JobEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        if let Some(subs) = subscribers.get_mut(&event.job_id) {
            subs.retain(|sub| sub.try_send(event.clone()).is_ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_all_current_subscribers() {
        let bus = ObserverBus::new();
        let run_id = zephyr_core::id::ResourceId::new();
        let job_id = JobId::new(run_id, "build");

        let mut a = bus.subscribe(job_id.clone(), 4);
        let mut b = bus.subscribe(job_id.clone(), 4);

        bus.publish(JobEvent {
            job_id: job_id.clone(),
            status: JobStatus::Running,
            logs_delta: None,
            timestamp: Utc::now(),
        });

        assert_eq!(a.recv().await.unwrap().status, JobStatus::Running);
        assert_eq!(b.recv().await.unwrap().status, JobStatus::Running);
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned_without_affecting_others() {
        let bus = ObserverBus::new();
        let run_id = zephyr_core::id::ResourceId::new();
        let job_id = JobId::new(run_id, "build");

        let dropped = bus.subscribe(job_id.clone(), 1);
        drop(dropped);
        let mut alive = bus.subscribe(job_id.clone(), 1);

        bus.publish(JobEvent {
            job_id: job_id.clone(),
            status: JobStatus::Success,
            logs_delta: None,
            timestamp: Utc::now(),
        });

        assert_eq!(alive.recv().await.unwrap().status, JobStatus::Success);
        assert_eq!(bus.subscribers.lock().unwrap().get(&job_id).unwrap().len(), 1);
    }
}
