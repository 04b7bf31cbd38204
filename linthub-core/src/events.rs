//! Per-job event topics.
//!
//! Every lifecycle message a job emits goes through [`JobEventBus::publish`],
//! which appends the entry to the durable log and then fans it out to live
//! subscribers. Appending first means a reader that loads the history and
//! then subscribes can miss nothing; at worst it sees an event twice during
//! the handover.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use linthub_model::{JobEvent, LogEntry, LogLevel};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::persistence::ports::LogRepository;

pub struct JobEventBus {
    log_store: Arc<dyn LogRepository>,
    topics: DashMap<Uuid, broadcast::Sender<JobEvent>>,
    capacity: usize,
}

impl JobEventBus {
    pub fn new(log_store: Arc<dyn LogRepository>) -> Self {
        Self::with_capacity(log_store, 256)
    }

    pub fn with_capacity(
        log_store: Arc<dyn LogRepository>,
        capacity: usize,
    ) -> Self {
        Self {
            log_store,
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to a job's live events, creating the topic on demand.
    /// Only events published after this call are delivered; earlier ones
    /// live in the durable log.
    pub fn subscribe(&self, job_id: Uuid) -> broadcast::Receiver<JobEvent> {
        self.topics
            .entry(job_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn receiver_count(&self, job_id: Uuid) -> usize {
        self.topics
            .get(&job_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Append an event to the job's log and broadcast it. A failed append
    /// is logged and the broadcast still happens; losing a log line must
    /// not stall the job that produced it.
    pub async fn publish(
        &self,
        job_id: Uuid,
        level: LogLevel,
        message: impl Into<String>,
    ) -> JobEvent {
        let event = JobEvent::new(job_id, level, message);

        if let Err(e) = self
            .log_store
            .append(job_id, event.level, &event.message, event.timestamp)
            .await
        {
            warn!(job_id = %job_id, error = %e, "failed to persist job event");
        }

        if let Some(tx) = self.topics.get(&job_id) {
            // Zero receivers is fine; the send result only reports that.
            let _ = tx.send(event.clone());
        }

        event
    }

    /// The durable history of a job's events, in append order.
    pub async fn log_history(&self, job_id: Uuid) -> Result<Vec<LogEntry>> {
        self.log_store.list_for_job(job_id).await
    }

    /// Drop a finished job's topic. Live receivers drain whatever is
    /// buffered and then observe the stream closing.
    pub fn retire(&self, job_id: Uuid) {
        self.topics.remove(&job_id);
    }

    /// Drop a topic only if nobody is listening. Subscribing to a job
    /// that already retired recreates its topic; callers that back out of
    /// such a subscription use this to avoid leaving the entry behind.
    pub fn prune(&self, job_id: Uuid) {
        self.topics
            .remove_if(&job_id, |_, tx| tx.receiver_count() == 0);
    }
}

impl fmt::Debug for JobEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobEventBus")
            .field("topics", &self.topics.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use linthub_model::LogEntry;
    use std::sync::Mutex;
    use tokio::sync::broadcast::error::RecvError;

    use crate::error::{AnalysisError, Result};

    #[derive(Default)]
    struct MemoryLogs {
        entries: Mutex<Vec<(Uuid, LogEntry)>>,
        fail: bool,
    }

    #[async_trait]
    impl LogRepository for MemoryLogs {
        async fn append(
            &self,
            job_id: Uuid,
            level: LogLevel,
            message: &str,
            timestamp: DateTime<Utc>,
        ) -> Result<()> {
            if self.fail {
                return Err(AnalysisError::Internal("store down".into()));
            }
            self.entries.lock().unwrap().push((
                job_id,
                LogEntry {
                    level,
                    message: message.to_string(),
                    timestamp,
                },
            ));
            Ok(())
        }

        async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<LogEntry>> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, _)| *id == job_id)
                .map(|(_, entry)| entry.clone())
                .collect())
        }
    }

    #[tokio::test]
    async fn publish_appends_and_fans_out() {
        let logs = Arc::new(MemoryLogs::default());
        let bus = JobEventBus::new(logs.clone());
        let job_id = Uuid::new_v4();

        let mut rx = bus.subscribe(job_id);
        bus.publish(job_id, LogLevel::Info, "starting fetch").await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.message, "starting fetch");
        assert_eq!(received.level, LogLevel::Info);

        let stored = logs.list_for_job(job_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].message, "starting fetch");
    }

    #[tokio::test]
    async fn publish_without_subscribers_still_persists() {
        let logs = Arc::new(MemoryLogs::default());
        let bus = JobEventBus::new(logs.clone());
        let job_id = Uuid::new_v4();

        assert_eq!(bus.receiver_count(job_id), 0);
        bus.publish(job_id, LogLevel::Error, "clone failed").await;

        let stored = logs.list_for_job(job_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].level, LogLevel::Error);
    }

    #[tokio::test]
    async fn retire_closes_the_stream_after_buffered_events() {
        let logs = Arc::new(MemoryLogs::default());
        let bus = JobEventBus::new(logs);
        let job_id = Uuid::new_v4();

        let mut rx = bus.subscribe(job_id);
        bus.publish(job_id, LogLevel::Info, "analysis complete, 3 findings")
            .await;
        bus.retire(job_id);

        let last = rx.recv().await.unwrap();
        assert_eq!(last.message, "analysis complete, 3 findings");
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
    }

    #[tokio::test]
    async fn a_failing_log_store_does_not_block_fanout() {
        let logs = Arc::new(MemoryLogs {
            fail: true,
            ..MemoryLogs::default()
        });
        let bus = JobEventBus::new(logs);
        let job_id = Uuid::new_v4();

        let mut rx = bus.subscribe(job_id);
        bus.publish(job_id, LogLevel::Info, "saved 0 results").await;

        assert_eq!(rx.recv().await.unwrap().message, "saved 0 results");
    }

    #[tokio::test]
    async fn topics_are_isolated_per_job() {
        let logs = Arc::new(MemoryLogs::default());
        let bus = JobEventBus::new(logs);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let mut rx_first = bus.subscribe(first);
        let mut rx_second = bus.subscribe(second);

        bus.publish(first, LogLevel::Info, "starting fetch").await;

        assert_eq!(rx_first.recv().await.unwrap().job_id, first);
        assert!(rx_second.try_recv().is_err());
    }

    #[tokio::test]
    async fn prune_spares_topics_with_live_receivers() {
        let logs = Arc::new(MemoryLogs::default());
        let bus = JobEventBus::new(logs);
        let job_id = Uuid::new_v4();

        let mut rx = bus.subscribe(job_id);
        bus.prune(job_id);
        bus.publish(job_id, LogLevel::Info, "starting fetch").await;
        assert_eq!(rx.recv().await.unwrap().message, "starting fetch");

        drop(rx);
        bus.prune(job_id);
        // A pruned topic no longer reaches anyone; a later subscriber
        // starts from a fresh channel.
        let mut rx = bus.subscribe(job_id);
        bus.publish(job_id, LogLevel::Info, "saved 1 results").await;
        assert_eq!(rx.recv().await.unwrap().message, "saved 1 results");
    }
}
