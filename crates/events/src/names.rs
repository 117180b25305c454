//! Well-known event type constants.
//!
//! These are the canonical `event_type` strings published on the
//! [`EventBus`](crate::EventBus) by the worker harness.

/// A claimed job began executing.
pub const JOB_STARTED: &str = "job.started";

/// A job's handler finished and reported success.
pub const JOB_COMPLETED: &str = "job.completed";

/// A job's handler failed, panicked, or carried an unparseable payload.
pub const JOB_FAILED: &str = "job.failed";

/// The stale-claim reaper released jobs back to the queue.
pub const JOBS_RELEASED: &str = "job.released";
