//! Tempest processing pipeline: tasks, handlers, and the worker harness.
//!
//! This crate turns uploaded survey data into finished artifacts:
//!
//! - [`Task`] — the closed set of pipeline stages and their queue
//!   payloads.
//! - [`EntityStore`] / [`JobQueue`] — the persistence seams, with a
//!   PostgreSQL implementation ([`PgStore`]) and an in-memory one
//!   ([`MemoryStore`]) for tests.
//! - [`Pipeline`] — the [`TaskHandler`] dispatching each stage to its
//!   handler (blur, panorama lookup, point-cloud conversion, depth-map
//!   rendering, dent analysis).
//! - [`aggregate`] — completion checks promoting parent entities once
//!   every child settles.
//! - [`Worker`] / [`Reaper`] — the claim/execute/acknowledge loop per
//!   queue and the stale-claim sweep.
//! - [`reset`] — user-triggered cascading resets.

pub mod aggregate;
pub mod context;
pub mod handlers;
pub mod harness;
pub mod limiter;
pub mod reset;
pub mod store;
pub mod task;

pub use aggregate::{check_hailpad_complete, check_path_complete, PathOutcome};
pub use context::{ConverterConfig, PipelineContext};
pub use handlers::{HandlerError, Pipeline, TaskHandler};
pub use harness::{Reaper, Worker, WorkerOptions};
pub use limiter::{RateLimit, RateLimiter};
pub use store::{EntityStore, JobQueue, MemoryStore, PgStore, StoreError};
pub use task::{QueueName, Task, WorkerResult};
