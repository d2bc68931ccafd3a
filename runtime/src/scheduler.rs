//! Background task poller.
//!
//! Tasks live in a durable queue. On every tick the poller fetches the tasks
//! that are due, runs them one at a time, earliest first, and removes a task
//! only after its handler reports success. A failed task stays in the queue
//! and is retried on the next tick, indefinitely.

use crate::metrics::RuntimeMetrics;
use chrono::{DateTime, Utc};
use reel_core::Clock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// A durable queue of scheduled tasks.
pub trait TaskQueue: Send + Sync + 'static {
    /// One queued task.
    type Task: Send + Sync + fmt::Debug;
    /// Storage failure.
    type Error: fmt::Display + Send;

    /// Tasks due at `now`, earliest first.
    fn due(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Self::Task>, Self::Error>> + Send;

    /// Run a task. `true` means it may be removed.
    fn process(&self, task: &Self::Task) -> impl Future<Output = bool> + Send;

    /// Remove a completed task.
    fn remove(&self, task: &Self::Task) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// What one poll did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Tasks processed and removed.
    pub succeeded: usize,
    /// Tasks left in place for the next poll.
    pub failed: usize,
}

/// Polls a [`TaskQueue`] on a fixed interval.
pub struct TaskPoller<Q> {
    queue: Arc<Q>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<Q: TaskQueue> TaskPoller<Q> {
    /// Create a poller and the sender that stops it.
    ///
    /// Send `true` to stop polling after the current task.
    #[must_use]
    pub fn new(
        queue: Arc<Q>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let poller = Self {
            queue,
            clock,
            interval,
            shutdown: shutdown_rx,
        };
        (poller, shutdown_tx)
    }

    /// Run every due task once.
    pub async fn poll_once(&self) -> PollSummary {
        let now = self.clock.now();
        let tasks = match self.queue.due(now).await {
            Ok(tasks) => tasks,
            Err(error) => {
                tracing::error!(%error, "Failed to load due tasks");
                return PollSummary::default();
            },
        };

        let mut summary = PollSummary::default();
        for task in tasks {
            if *self.shutdown.borrow() {
                break;
            }
            if !self.queue.process(&task).await {
                tracing::warn!(?task, "Task failed, will retry on next poll");
                RuntimeMetrics::record_task("failed");
                summary.failed += 1;
                continue;
            }
            match self.queue.remove(&task).await {
                Ok(()) => {
                    tracing::info!(?task, "Task completed");
                    RuntimeMetrics::record_task("ok");
                    summary.succeeded += 1;
                },
                Err(error) => {
                    tracing::error!(?task, %error, "Task completed but could not be removed");
                    RuntimeMetrics::record_task("unremoved");
                    summary.failed += 1;
                },
            }
        }
        summary
    }

    /// Poll until shutdown.
    pub async fn run(mut self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Starting task poller");
        let mut ticker = tokio::time::interval(self.interval);
        while !*self.shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = self.poll_once().await;
                    if summary != PollSummary::default() {
                        tracing::debug!(?summary, "Poll finished");
                    }
                }
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        tracing::info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }
        tracing::info!("Task poller stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Job {
        key: String,
        due: DateTime<Utc>,
        succeeds: bool,
    }

    #[derive(Default)]
    struct MemoryQueue {
        jobs: Mutex<Vec<Job>>,
        runs: Mutex<Vec<String>>,
    }

    impl TaskQueue for MemoryQueue {
        type Task = Job;
        type Error = String;

        async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Job>, String> {
            let mut due: Vec<Job> = self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|job| job.due <= now)
                .cloned()
                .collect();
            due.sort_by_key(|job| job.due);
            Ok(due)
        }

        async fn process(&self, task: &Job) -> bool {
            self.runs.lock().unwrap().push(task.key.clone());
            task.succeeds
        }

        async fn remove(&self, task: &Job) -> Result<(), String> {
            self.jobs.lock().unwrap().retain(|job| job.key != task.key);
            Ok(())
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, minute, 0).unwrap()
    }

    fn job(key: &str, minute: u32, succeeds: bool) -> Job {
        Job {
            key: key.to_owned(),
            due: at(minute),
            succeeds,
        }
    }

    fn poller(queue: &Arc<MemoryQueue>, now: u32) -> TaskPoller<MemoryQueue> {
        let (poller, _shutdown) = TaskPoller::new(
            Arc::clone(queue),
            Arc::new(FixedClock(at(now))),
            Duration::from_secs(10),
        );
        poller
    }

    #[tokio::test]
    async fn test_runs_due_tasks_earliest_first() {
        let queue = Arc::new(MemoryQueue::default());
        *queue.jobs.lock().unwrap() = vec![
            job("later", 5, true),
            job("first", 1, true),
            job("future", 30, true),
        ];

        let summary = poller(&queue, 10).poll_once().await;

        assert_eq!(summary.succeeded, 2);
        assert_eq!(*queue.runs.lock().unwrap(), vec!["first", "later"]);
        assert_eq!(queue.jobs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_task_retried_every_poll() {
        let queue = Arc::new(MemoryQueue::default());
        *queue.jobs.lock().unwrap() = vec![job("flaky", 1, false)];
        let poller = poller(&queue, 10);

        for _ in 0..3 {
            let summary = poller.poll_once().await;
            assert_eq!(summary.failed, 1);
        }

        assert_eq!(queue.runs.lock().unwrap().len(), 3);
        assert_eq!(queue.jobs.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let queue = Arc::new(MemoryQueue::default());
        let (poller, shutdown) = TaskPoller::new(
            Arc::clone(&queue),
            Arc::new(FixedClock(at(0))),
            Duration::from_secs(10),
        );
        let handle = tokio::spawn(poller.run());
        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }
}
