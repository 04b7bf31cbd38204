//! Bounded execution pool for analysis jobs.
//!
//! A fixed set of warm workers drains a bounded queue. When a submission
//! finds the queue full and the worker count below the maximum, a new
//! worker is spawned and takes that submission directly, so total
//! capacity is `max_workers` running plus `backlog` waiting. Beyond that
//! the submission is rejected synchronously. Workers stay for the life
//! of the pool; one lost to a panicking job releases its slot, and a
//! later submission brings a replacement up.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AnalysisError, Result};

/// Pool bounds. Defaults mirror the service's documented shape: two warm
/// workers, five concurrent executions, ten waiting submissions.
#[derive(Debug, Clone, Copy)]
pub struct PoolLimits {
    pub warm_workers: usize,
    pub max_workers: usize,
    pub backlog: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        PoolLimits {
            warm_workers: 2,
            max_workers: 5,
            backlog: 10,
        }
    }
}

type JobTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct QueuedJob {
    job_id: Uuid,
    task: JobTask,
}

pub struct AnalysisPool {
    queue_tx: mpsc::Sender<QueuedJob>,
    queue_rx: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    workers: Arc<AtomicUsize>,
    max_workers: usize,
}

/// A worker's claim on the pool's counter, released on drop. A panicking
/// job unwinds its worker task; dropping the slot there hands the
/// capacity back instead of retiring it.
struct WorkerSlot(Arc<AtomicUsize>);

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AnalysisPool {
    /// Build the pool and spawn its warm workers. Must run inside a tokio
    /// runtime.
    pub fn new(limits: PoolLimits) -> Self {
        let max_workers = limits.max_workers.max(1);
        let warm_workers = limits.warm_workers.clamp(1, max_workers);
        let (queue_tx, queue_rx) = mpsc::channel(limits.backlog.max(1));

        let pool = Self {
            queue_tx,
            queue_rx: Arc::new(Mutex::new(queue_rx)),
            workers: Arc::new(AtomicUsize::new(0)),
            max_workers,
        };
        for _ in 0..warm_workers {
            if pool.try_reserve_worker() {
                pool.spawn_worker(None);
            }
        }
        pool
    }

    /// Hand a job's execution to the pool, or refuse it right away when
    /// both the workers and the backlog are exhausted.
    pub fn submit<F>(&self, job_id: Uuid, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let queued = QueuedJob {
            job_id,
            task: Box::pin(task),
        };

        match self.queue_tx.try_send(queued) {
            Ok(()) => {
                // Panicked workers release their slots; the queue must
                // never be left without a drainer.
                if self.worker_count() == 0 && self.try_reserve_worker() {
                    self.spawn_worker(None);
                }
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(queued)) => {
                if self.try_reserve_worker() {
                    // The fresh worker takes this submission directly;
                    // queue order for the already waiting jobs holds.
                    self.spawn_worker(Some(queued));
                    Ok(())
                } else {
                    debug!(job_id = %queued.job_id, "pool saturated");
                    Err(AnalysisError::Saturated)
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(
                AnalysisError::Internal("analysis pool is stopped".to_string()),
            ),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.load(Ordering::SeqCst)
    }

    fn try_reserve_worker(&self) -> bool {
        self.workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                (count < self.max_workers).then_some(count + 1)
            })
            .is_ok()
    }

    fn spawn_worker(&self, handoff: Option<QueuedJob>) {
        let queue_rx = Arc::clone(&self.queue_rx);
        let slot = WorkerSlot(Arc::clone(&self.workers));
        tokio::spawn(async move {
            let _slot = slot;
            if let Some(job) = handoff {
                debug!(job_id = %job.job_id, "worker took direct handoff");
                job.task.await;
            }
            loop {
                // Hold the receiver lock only while waiting, not while
                // the job runs.
                let next = { queue_rx.lock().await.recv().await };
                match next {
                    Some(job) => {
                        debug!(job_id = %job.job_id, "worker dequeued job");
                        job.task.await;
                    }
                    None => break,
                }
            }
        });
    }
}

impl fmt::Debug for AnalysisPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisPool")
            .field("workers", &self.worker_count())
            .field("max_workers", &self.max_workers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn blocked_task(
        started: mpsc::UnboundedSender<Uuid>,
        release: oneshot::Receiver<()>,
        id: Uuid,
    ) -> impl Future<Output = ()> + Send + 'static {
        async move {
            let _ = started.send(id);
            let _ = release.await;
        }
    }

    #[tokio::test]
    async fn starts_the_warm_workers() {
        let pool = AnalysisPool::new(PoolLimits::default());
        assert_eq!(pool.worker_count(), 2);
    }

    async fn wait_for_start(
        started_rx: &mut mpsc::UnboundedReceiver<Uuid>,
        expected: Uuid,
    ) {
        let got = tokio::time::timeout(Duration::from_secs(5), started_rx.recv())
            .await
            .unwrap();
        assert_eq!(got, Some(expected));
    }

    fn submit_blocked(
        pool: &AnalysisPool,
        started_tx: &mpsc::UnboundedSender<Uuid>,
        releases: &mut Vec<oneshot::Sender<()>>,
    ) -> Result<Uuid> {
        let (release_tx, release_rx) = oneshot::channel();
        let id = Uuid::new_v4();
        let result =
            pool.submit(id, blocked_task(started_tx.clone(), release_rx, id));
        releases.push(release_tx);
        result.map(|()| id)
    }

    #[tokio::test]
    async fn rejects_beyond_workers_plus_backlog() {
        let limits = PoolLimits {
            warm_workers: 1,
            max_workers: 2,
            backlog: 2,
        };
        let pool = AnalysisPool::new(limits);
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let mut releases = Vec::new();

        // Occupy the warm worker, then fill the backlog behind it.
        let first = submit_blocked(&pool, &started_tx, &mut releases).unwrap();
        wait_for_start(&mut started_rx, first).await;
        submit_blocked(&pool, &started_tx, &mut releases).unwrap();
        submit_blocked(&pool, &started_tx, &mut releases).unwrap();
        assert_eq!(pool.worker_count(), 1);

        // A full backlog brings up the second worker via direct handoff.
        let handed_off =
            submit_blocked(&pool, &started_tx, &mut releases).unwrap();
        wait_for_start(&mut started_rx, handed_off).await;
        assert_eq!(pool.worker_count(), 2);

        // Both workers busy, backlog full: the next submission bounces.
        let rejected = submit_blocked(&pool, &started_tx, &mut releases);
        assert!(matches!(rejected, Err(AnalysisError::Saturated)));

        // Draining one running job frees capacity again.
        releases.remove(0).send(()).unwrap();
        let resumed =
            tokio::time::timeout(Duration::from_secs(5), started_rx.recv())
                .await
                .unwrap();
        assert!(resumed.is_some());
        submit_blocked(&pool, &started_tx, &mut releases).unwrap();

        for release in releases {
            let _ = release.send(());
        }
    }

    #[tokio::test]
    async fn grows_past_the_warm_set_when_the_backlog_fills() {
        let limits = PoolLimits {
            warm_workers: 1,
            max_workers: 3,
            backlog: 1,
        };
        let pool = AnalysisPool::new(limits);
        assert_eq!(pool.worker_count(), 1);

        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let mut releases = Vec::new();

        let first = submit_blocked(&pool, &started_tx, &mut releases).unwrap();
        wait_for_start(&mut started_rx, first).await;
        submit_blocked(&pool, &started_tx, &mut releases).unwrap();
        assert_eq!(pool.worker_count(), 1);

        // Each submission past the full backlog adds a worker, up to the
        // maximum.
        let second_worker =
            submit_blocked(&pool, &started_tx, &mut releases).unwrap();
        wait_for_start(&mut started_rx, second_worker).await;
        assert_eq!(pool.worker_count(), 2);

        let third_worker =
            submit_blocked(&pool, &started_tx, &mut releases).unwrap();
        wait_for_start(&mut started_rx, third_worker).await;
        assert_eq!(pool.worker_count(), 3);

        for release in releases {
            let _ = release.send(());
        }
    }

    #[tokio::test]
    async fn a_panicking_job_releases_its_worker_slot() {
        let limits = PoolLimits {
            warm_workers: 1,
            max_workers: 1,
            backlog: 1,
        };
        let pool = AnalysisPool::new(limits);
        assert_eq!(pool.worker_count(), 1);

        pool.submit(Uuid::new_v4(), async {
            panic!("poisoned job");
        })
        .unwrap();

        // The unwound worker hands its slot back.
        tokio::time::timeout(Duration::from_secs(5), async {
            while pool.worker_count() != 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        // The next submission brings up a replacement and still runs.
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        pool.submit(Uuid::new_v4(), async move {
            let _ = done_tx.send(());
        })
        .unwrap();
        let ran = tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
            .await
            .unwrap();
        assert_eq!(ran, Some(()));
    }

    #[tokio::test]
    async fn completed_jobs_free_their_slots() {
        let limits = PoolLimits {
            warm_workers: 1,
            max_workers: 1,
            backlog: 1,
        };
        let pool = AnalysisPool::new(limits);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        for round in 0..5u32 {
            let done = done_tx.clone();
            pool.submit(Uuid::new_v4(), async move {
                let _ = done.send(round);
            })
            .unwrap();
            let finished =
                tokio::time::timeout(Duration::from_secs(1), done_rx.recv())
                    .await
                    .unwrap();
            assert_eq!(finished, Some(round));
        }
    }
}
