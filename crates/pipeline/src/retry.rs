//! Out-of-band retries of failed conversion attempts.
//!
//! [`RetrySupervisor::schedule`] never blocks: it either accepts the job
//! onto a bounded queue or says why not. A supervisor loop turns queued
//! jobs into tracked tasks, each of which waits, takes a concurrency
//! permit and runs [`Reconverter::reconvert`]. A job stays in the
//! in-flight set from `schedule` until its task ends, so the same job is
//! never retried twice at once.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use sketchbook_core::config::{env_or, env_secs_or};
use sketchbook_core::error::CoreError;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::PipelineError;
use crate::job::{JobRef, Reconverter};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Jobs that may wait for a retry task (`RETRY_QUEUE_CAPACITY`, default 256).
    pub queue_capacity: usize,
    /// Retries running at once (`RETRY_CONCURRENCY`, default 4).
    pub concurrency: usize,
    /// Attempts per scheduled job (`RETRY_MAX_ATTEMPTS`, default 1).
    pub max_attempts: u32,
    /// Wait before the first attempt, doubled before each further one
    /// (`RETRY_DELAY_SECS`, default 5).
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            concurrency: 4,
            max_attempts: 1,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        let config = Self {
            queue_capacity: env_or("RETRY_QUEUE_CAPACITY", 256)?,
            concurrency: env_or("RETRY_CONCURRENCY", 4)?,
            max_attempts: env_or("RETRY_MAX_ATTEMPTS", 1)?,
            delay: env_secs_or("RETRY_DELAY_SECS", 5)?,
        };
        if config.queue_capacity == 0 || config.concurrency == 0 || config.max_attempts == 0 {
            return Err(CoreError::Config(
                "RETRY_QUEUE_CAPACITY, RETRY_CONCURRENCY and RETRY_MAX_ATTEMPTS must be positive"
                    .to_string(),
            ));
        }
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Why [`RetrySupervisor::schedule`] refused a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Retry queue is full")]
    QueueFull,
    #[error("{0} already has a retry scheduled")]
    AlreadyScheduled(JobRef),
    #[error("Retry supervisor is shutting down")]
    ShuttingDown,
}

/// Snapshot of the supervisor's activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryStats {
    /// Accepted jobs not yet picked up by the supervisor loop.
    pub queued: usize,
    /// Retry tasks alive (waiting or converting).
    pub in_flight: usize,
    /// Retries that ended with a processed job.
    pub completed: u64,
    /// Retries that gave up with the job still failed.
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    completed: AtomicU64,
    failed: AtomicU64,
}

type InFlightSet = Arc<Mutex<HashSet<JobRef>>>;

pub struct RetrySupervisor {
    sender: mpsc::Sender<JobRef>,
    scheduled: InFlightSet,
    counters: Arc<Counters>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

impl RetrySupervisor {
    /// Spawn the supervisor loop. Must be called inside a Tokio runtime.
    pub fn start<R>(reconverter: Arc<R>, config: RetryConfig) -> Self
    where
        R: Reconverter + 'static,
    {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let scheduled: InFlightSet = Arc::default();
        let counters = Arc::new(Counters::default());
        let tracker = TaskTracker::new();
        let cancel = CancellationToken::new();

        tracing::info!(
            queue_capacity = config.queue_capacity,
            concurrency = config.concurrency,
            max_attempts = config.max_attempts,
            delay_secs = config.delay.as_secs(),
            "Retry supervisor started"
        );

        let supervisor = SupervisorLoop {
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
            reconverter,
            config,
            scheduled: Arc::clone(&scheduled),
            counters: Arc::clone(&counters),
            tracker: tracker.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(supervisor.run(receiver));

        Self {
            sender,
            scheduled,
            counters,
            tracker,
            cancel,
            supervisor: Mutex::new(Some(handle)),
        }
    }

    /// Accept `job` for a retry without waiting.
    pub fn schedule(&self, job: JobRef) -> Result<(), ScheduleError> {
        if self.cancel.is_cancelled() {
            return Err(ScheduleError::ShuttingDown);
        }
        if !lock(&self.scheduled).insert(job) {
            return Err(ScheduleError::AlreadyScheduled(job));
        }

        match self.sender.try_send(job) {
            Ok(()) => {
                tracing::debug!(job_id = job.id, kind = %job.kind, "Retry scheduled");
                Ok(())
            }
            Err(e) => {
                lock(&self.scheduled).remove(&job);
                match e {
                    mpsc::error::TrySendError::Full(_) => Err(ScheduleError::QueueFull),
                    mpsc::error::TrySendError::Closed(_) => Err(ScheduleError::ShuttingDown),
                }
            }
        }
    }

    /// Whether `job` is queued or has a retry task running.
    pub fn is_scheduled(&self, job: JobRef) -> bool {
        lock(&self.scheduled).contains(&job)
    }

    pub fn stats(&self) -> RetryStats {
        RetryStats {
            queued: self.sender.max_capacity() - self.sender.capacity(),
            in_flight: self.tracker.len(),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting jobs, cancel retries still waiting for their delay,
    /// and wait up to `timeout` for running attempts to finish.
    pub async fn shutdown(&self, timeout: Duration) {
        self.cancel.cancel();
        let handle = lock(&self.supervisor).take();

        let drain = async {
            if let Some(handle) = handle {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Retry supervisor loop panicked");
                }
            }
            self.tracker.close();
            self.tracker.wait().await;
        };

        if tokio::time::timeout(timeout, drain).await.is_err() {
            tracing::warn!(
                remaining = self.tracker.len(),
                "Retry supervisor did not drain before shutdown timeout"
            );
        } else {
            tracing::info!("Retry supervisor stopped");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases a job's in-flight slot when its task ends, however it ends.
struct ScheduledGuard {
    scheduled: InFlightSet,
    job: JobRef,
}

impl Drop for ScheduledGuard {
    fn drop(&mut self) {
        lock(&self.scheduled).remove(&self.job);
    }
}

// ---------------------------------------------------------------------------
// Loop and tasks
// ---------------------------------------------------------------------------

struct SupervisorLoop<R> {
    reconverter: Arc<R>,
    config: RetryConfig,
    permits: Arc<Semaphore>,
    scheduled: InFlightSet,
    counters: Arc<Counters>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl<R: Reconverter + 'static> SupervisorLoop<R> {
    async fn run(self, mut receiver: mpsc::Receiver<JobRef>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = receiver.recv() => match next {
                    Some(job) => self.spawn_retry(job),
                    None => break,
                },
            }
        }

        receiver.close();
        while let Ok(job) = receiver.try_recv() {
            lock(&self.scheduled).remove(&job);
        }
        tracing::debug!("Retry supervisor loop exited");
    }

    fn spawn_retry(&self, job: JobRef) {
        let task = RetryTask {
            guard: ScheduledGuard {
                scheduled: Arc::clone(&self.scheduled),
                job,
            },
            job,
            reconverter: Arc::clone(&self.reconverter),
            max_attempts: self.config.max_attempts.max(1),
            delay: self.config.delay,
            permits: Arc::clone(&self.permits),
            counters: Arc::clone(&self.counters),
            cancel: self.cancel.clone(),
        };
        self.tracker.spawn(task.run());
    }
}

struct RetryTask<R> {
    guard: ScheduledGuard,
    job: JobRef,
    reconverter: Arc<R>,
    max_attempts: u32,
    delay: Duration,
    permits: Arc<Semaphore>,
    counters: Arc<Counters>,
    cancel: CancellationToken,
}

impl<R: Reconverter + 'static> RetryTask<R> {
    async fn run(self) {
        let _guard = self.guard;
        let job = self.job;
        let mut delay = self.delay;

        for attempt in 1..=self.max_attempts {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!(job_id = job.id, kind = %job.kind, "Retry cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let _permit = tokio::select! {
                _ = self.cancel.cancelled() => return,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            match self.reconverter.reconvert(job).await {
                Ok(()) => {
                    self.counters.completed.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(job_id = job.id, kind = %job.kind, attempt, "Retry succeeded");
                    return;
                }
                Err(
                    e @ (PipelineError::InFlight(_)
                    | PipelineError::Superseded(_)
                    | PipelineError::AlreadyProcessed(_)),
                ) => {
                    tracing::info!(
                        job_id = job.id,
                        kind = %job.kind,
                        reason = %e,
                        "Retry no longer needed"
                    );
                    return;
                }
                Err(e) if !e.is_retryable() || attempt == self.max_attempts => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        job_id = job.id,
                        kind = %job.kind,
                        attempt,
                        retryable = e.is_retryable(),
                        error = %e,
                        "Retry failed, job left in error"
                    );
                    return;
                }
                Err(e) => {
                    tracing::debug!(
                        job_id = job.id,
                        kind = %job.kind,
                        attempt,
                        error = %e,
                        "Retry attempt failed, backing off"
                    );
                    delay = delay.saturating_mul(2);
                }
            }
        }
    }
}
