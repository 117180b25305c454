//! Queue worker harness: claim, execute, acknowledge.
//!
//! One [`Worker`] per queue ticks on a poll interval and claims as many
//! pending jobs as its semaphore permits and rate budget allow, running
//! each in its own task. Handler panics and infrastructure errors both
//! end in a best-effort entity failure write and a Failed
//! acknowledgement; a job is never left wedged by its own handler.
//!
//! The [`Reaper`] complements the workers: claimed jobs whose worker
//! died are returned to Pending once their claim outlives the
//! visibility timeout.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use tempest_db::models::job::Job;
use tempest_events::{names, EventBus, PipelineEvent};

use crate::handlers::TaskHandler;
use crate::limiter::{RateLimit, RateLimiter};
use crate::store::JobQueue;
use crate::task::{QueueName, Task, WorkerResult};

/// Default delay between claim sweeps on an idle queue.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default concurrent executions per queue.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// How long shutdown waits for in-flight jobs before giving up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Per-queue worker tuning.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub queue: QueueName,
    pub concurrency: usize,
    pub rate_limit: Option<RateLimit>,
    pub poll_interval: Duration,
}

impl WorkerOptions {
    pub fn new(queue: QueueName) -> Self {
        Self {
            queue,
            concurrency: DEFAULT_CONCURRENCY,
            rate_limit: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Long-lived claim loop for one queue.
pub struct Worker {
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn TaskHandler>,
    events: Arc<EventBus>,
    options: WorkerOptions,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        handler: Arc<dyn TaskHandler>,
        events: Arc<EventBus>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            queue,
            handler,
            events,
            options,
        }
    }

    /// Run the claim loop until the cancellation token fires, then wait
    /// briefly for in-flight jobs.
    pub async fn run(&self, cancel: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let mut limiter = self.options.rate_limit.map(RateLimiter::new);
        let mut ticker = tokio::time::interval(self.options.poll_interval);
        tracing::info!(
            queue = %self.options.queue,
            concurrency = self.options.concurrency,
            rate_limited = limiter.is_some(),
            "Queue worker started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(queue = %self.options.queue, "Queue worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.drain_available(&semaphore, &mut limiter).await;
                }
            }
        }

        let all_permits = self.options.concurrency as u32;
        let drained = tokio::time::timeout(
            SHUTDOWN_GRACE,
            Arc::clone(&semaphore).acquire_many_owned(all_permits),
        )
        .await;
        if drained.is_err() {
            tracing::warn!(
                queue = %self.options.queue,
                "In-flight jobs still running at shutdown",
            );
        }
    }

    /// Claim and start jobs until the queue is empty, permits run out,
    /// or the rate budget for this window is spent.
    async fn drain_available(
        &self,
        semaphore: &Arc<Semaphore>,
        limiter: &mut Option<RateLimiter>,
    ) {
        loop {
            if let Some(limiter) = limiter.as_mut() {
                if !limiter.has_budget() {
                    break;
                }
            }
            // A free execution slot must exist before claiming, so a
            // claimed job never waits in memory behind the semaphore.
            let Ok(permit) = Arc::clone(semaphore).try_acquire_owned() else {
                break;
            };
            match self.queue.claim(self.options.queue).await {
                Ok(Some(job)) => {
                    if let Some(limiter) = limiter.as_mut() {
                        limiter.record_start();
                    }
                    self.spawn_job(job, permit);
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::error!(queue = %self.options.queue, error = %err, "Claim failed");
                    break;
                }
            }
        }
    }

    fn spawn_job(&self, job: Job, permit: OwnedSemaphorePermit) {
        let handler = Arc::clone(&self.handler);
        let queue_ops = Arc::clone(&self.queue);
        let events = Arc::clone(&self.events);
        let queue = self.options.queue;
        tokio::spawn(async move {
            let _permit = permit;
            run_job(queue, job, handler, queue_ops, events).await;
        });
    }
}

/// Execute one claimed job through the full lifecycle: parse, handle
/// (panic-safe), acknowledge, publish.
async fn run_job(
    queue: QueueName,
    job: Job,
    handler: Arc<dyn TaskHandler>,
    queue_ops: Arc<dyn JobQueue>,
    events: Arc<EventBus>,
) {
    let task = match Task::from_queue_payload(queue, &job.payload) {
        Ok(task) => task,
        Err(err) => {
            // Nothing to dispatch and no entity to fail; acknowledge the
            // poisoned job so it cannot clog the queue.
            tracing::error!(job_id = job.id, queue = %queue, error = %err, "Unparseable job payload");
            if let Err(err) = queue_ops
                .fail_job(job.id, &format!("unparseable payload: {err}"))
                .await
            {
                tracing::error!(job_id = job.id, error = %err, "Failed to acknowledge poisoned job");
            }
            events.publish(
                PipelineEvent::new(names::JOB_FAILED)
                    .with_source("job", job.id)
                    .with_payload(serde_json::json!({
                        "queue": queue.as_str(),
                        "message": "unparseable payload",
                    })),
            );
            return;
        }
    };

    tracing::info!(job_id = job.id, queue = %queue, attempts = job.attempts, "Job started");
    events.publish(
        PipelineEvent::new(names::JOB_STARTED)
            .with_source("job", job.id)
            .with_payload(serde_json::json!({
                "queue": queue.as_str(),
                "attempts": job.attempts,
            })),
    );

    let outcome = AssertUnwindSafe(handler.handle(&task)).catch_unwind().await;
    let result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => {
            tracing::error!(job_id = job.id, queue = %queue, error = %err, "Handler error");
            handler.fail_entity(&task).await;
            WorkerResult::failed(format!("handler error: {err}"))
        }
        Err(_panic) => {
            tracing::error!(job_id = job.id, queue = %queue, "Handler panicked");
            handler.fail_entity(&task).await;
            WorkerResult::failed("handler panicked")
        }
    };

    let ack = if result.success {
        queue_ops.complete_job(job.id).await
    } else {
        queue_ops
            .fail_job(job.id, result.message.as_deref().unwrap_or("failed"))
            .await
    };
    if let Err(err) = ack {
        tracing::error!(job_id = job.id, error = %err, "Failed to acknowledge job");
    }

    let event_type = if result.success {
        names::JOB_COMPLETED
    } else {
        names::JOB_FAILED
    };
    events.publish(
        PipelineEvent::new(event_type)
            .with_source("job", job.id)
            .with_payload(serde_json::json!({
                "queue": queue.as_str(),
                "message": result.message,
            })),
    );

    if result.success {
        tracing::info!(job_id = job.id, queue = %queue, "Job completed");
    } else {
        tracing::warn!(job_id = job.id, queue = %queue, message = ?result.message, "Job failed");
    }
}

// ---------------------------------------------------------------------------
// Reaper
// ---------------------------------------------------------------------------

/// Default delay between stale-claim sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Background sweep returning stale claimed jobs to Pending.
pub struct Reaper {
    queue: Arc<dyn JobQueue>,
    events: Arc<EventBus>,
    visibility_timeout: Duration,
    sweep_interval: Duration,
}

impl Reaper {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        events: Arc<EventBus>,
        visibility_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            events,
            visibility_timeout,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    /// Run the sweep loop until the cancellation token fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        tracing::info!(
            visibility_timeout_secs = self.visibility_timeout.as_secs(),
            "Stale-claim reaper started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Stale-claim reaper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.queue.release_stale(self.visibility_timeout).await {
                        Ok(0) => {}
                        Ok(released) => {
                            tracing::warn!(released, "Released stale job claims");
                            self.events.publish(
                                PipelineEvent::new(names::JOBS_RELEASED)
                                    .with_payload(serde_json::json!({ "count": released })),
                            );
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "Stale-claim sweep failed");
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use tempest_core::types::DbId;
    use tempest_db::models::job::QueueCounts;
    use tempest_db::models::status::JobStatus;

    use crate::handlers::HandlerError;
    use crate::store::{MemoryStore, StoreError};

    /// Handler stub with a scripted outcome per call.
    struct ScriptedHandler {
        outcome: Outcome,
        fail_entity_called: AtomicBool,
    }

    enum Outcome {
        Succeed,
        Panic,
        Error,
    }

    impl ScriptedHandler {
        fn new(outcome: Outcome) -> Self {
            Self {
                outcome,
                fail_entity_called: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl TaskHandler for ScriptedHandler {
        async fn handle(&self, _task: &Task) -> Result<WorkerResult, HandlerError> {
            match self.outcome {
                Outcome::Succeed => Ok(WorkerResult::ok()),
                Outcome::Panic => panic!("scripted panic"),
                Outcome::Error => Err(HandlerError::Store(StoreError::Internal(
                    "scripted error".into(),
                ))),
            }
        }

        async fn fail_entity(&self, _task: &Task) {
            self.fail_entity_called.store(true, Ordering::SeqCst);
        }
    }

    fn options(queue: QueueName) -> WorkerOptions {
        WorkerOptions {
            queue,
            concurrency: 2,
            rate_limit: None,
            poll_interval: Duration::from_millis(10),
        }
    }

    async fn run_worker_until_idle(worker: &Worker) {
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        tokio::join!(worker.run(cancel), async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            stop.cancel();
        });
    }

    // -- lifecycle --

    #[tokio::test]
    async fn successful_job_is_acknowledged_and_published() {
        let store = Arc::new(MemoryStore::new());
        let handler = Arc::new(ScriptedHandler::new(Outcome::Succeed));
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();

        let job = store.enqueue(&Task::Blur { capture_id: 1 }).await.unwrap();
        let worker = Worker::new(
            store.clone(),
            handler.clone(),
            events,
            options(QueueName::Blur),
        );
        run_worker_until_idle(&worker).await;

        let job = store.job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status_id, JobStatus::Completed.id());
        assert!(job.completed_at.is_some());
        assert!(!handler.fail_entity_called.load(Ordering::SeqCst));

        let started = rx.recv().await.unwrap();
        assert_eq!(started.event_type, names::JOB_STARTED);
        let completed = rx.recv().await.unwrap();
        assert_eq!(completed.event_type, names::JOB_COMPLETED);
        assert_eq!(completed.source_entity_id, Some(job.id));
    }

    #[tokio::test]
    async fn panicking_handler_fails_job_and_entity() {
        let store = Arc::new(MemoryStore::new());
        let handler = Arc::new(ScriptedHandler::new(Outcome::Panic));
        let events = Arc::new(EventBus::default());

        let job = store.enqueue(&Task::Blur { capture_id: 1 }).await.unwrap();
        let worker = Worker::new(
            store.clone(),
            handler.clone(),
            events,
            options(QueueName::Blur),
        );
        run_worker_until_idle(&worker).await;

        let job = store.job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status_id, JobStatus::Failed.id());
        assert_eq!(job.last_error.as_deref(), Some("handler panicked"));
        assert!(handler.fail_entity_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn handler_error_fails_job_and_entity() {
        let store = Arc::new(MemoryStore::new());
        let handler = Arc::new(ScriptedHandler::new(Outcome::Error));
        let events = Arc::new(EventBus::default());

        let job = store.enqueue(&Task::Blur { capture_id: 1 }).await.unwrap();
        let worker = Worker::new(
            store.clone(),
            handler.clone(),
            events,
            options(QueueName::Blur),
        );
        run_worker_until_idle(&worker).await;

        let job = store.job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status_id, JobStatus::Failed.id());
        assert!(job
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("scripted error")));
        assert!(handler.fail_entity_called.load(Ordering::SeqCst));
    }

    // -- poisoned payloads --

    /// Queue stub that hands out one malformed job.
    struct PoisonedQueue {
        job_taken: AtomicBool,
        failure: tokio::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl JobQueue for PoisonedQueue {
        async fn enqueue(&self, _task: &Task) -> Result<Job, StoreError> {
            Err(StoreError::Internal("not used".into()))
        }

        async fn claim(&self, queue: QueueName) -> Result<Option<Job>, StoreError> {
            if self.job_taken.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            Ok(Some(Job {
                id: 77,
                queue: queue.as_str().to_string(),
                payload: serde_json::json!({ "unexpected": true }),
                status_id: JobStatus::Running.id(),
                attempts: 1,
                last_error: None,
                submitted_at: chrono::Utc::now(),
                claimed_at: Some(chrono::Utc::now()),
                completed_at: None,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            }))
        }

        async fn complete_job(&self, _job_id: DbId) -> Result<(), StoreError> {
            panic!("poisoned job must not complete");
        }

        async fn fail_job(&self, _job_id: DbId, error: &str) -> Result<(), StoreError> {
            *self.failure.lock().await = Some(error.to_string());
            Ok(())
        }

        async fn release_stale(&self, _older_than: Duration) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn job(&self, _job_id: DbId) -> Result<Option<Job>, StoreError> {
            Ok(None)
        }

        async fn counts(&self, _queue: QueueName) -> Result<QueueCounts, StoreError> {
            Ok(QueueCounts::default())
        }
    }

    #[tokio::test]
    async fn unparseable_payload_is_failed_without_dispatch() {
        let queue = Arc::new(PoisonedQueue {
            job_taken: AtomicBool::new(false),
            failure: tokio::sync::Mutex::new(None),
        });
        let handler = Arc::new(ScriptedHandler::new(Outcome::Panic));
        let events = Arc::new(EventBus::default());

        let worker = Worker::new(
            queue.clone(),
            handler.clone(),
            events,
            options(QueueName::Blur),
        );
        run_worker_until_idle(&worker).await;

        let failure = queue.failure.lock().await.clone();
        assert!(failure.is_some_and(|e| e.contains("unparseable payload")));
        // The handler never ran: no panic, no entity write.
        assert!(!handler.fail_entity_called.load(Ordering::SeqCst));
    }

    // -- rate limiting --

    #[tokio::test]
    async fn rate_limit_caps_starts_per_window() {
        let store = Arc::new(MemoryStore::new());
        let handler = Arc::new(ScriptedHandler::new(Outcome::Succeed));
        let events = Arc::new(EventBus::default());

        for capture_id in 1..=3 {
            store
                .enqueue(&Task::Blur { capture_id })
                .await
                .unwrap();
        }

        let mut options = options(QueueName::Blur);
        options.rate_limit = Some(RateLimit {
            max_starts: 1,
            window: Duration::from_secs(3600),
        });
        let worker = Worker::new(store.clone(), handler, events, options);
        run_worker_until_idle(&worker).await;

        let counts = store.counts(QueueName::Blur).await.unwrap();
        assert_eq!(counts.completed, 1, "one start per window");
        assert_eq!(counts.pending, 2);
    }

    // -- reaper --

    #[tokio::test]
    async fn reaper_republishes_stale_claims() {
        let store = Arc::new(MemoryStore::new());
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();

        store.enqueue(&Task::Blur { capture_id: 1 }).await.unwrap();
        let job = store.claim(QueueName::Blur).await.unwrap().unwrap();

        let reaper = Reaper::new(store.clone(), events, Duration::ZERO)
            .with_sweep_interval(Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        tokio::join!(reaper.run(cancel), async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stop.cancel();
        });

        let job = store.job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status_id, JobStatus::Pending.id());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, names::JOBS_RELEASED);
        assert_eq!(event.payload["count"], 1);
    }
}
