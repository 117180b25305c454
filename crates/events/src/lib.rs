//! Tempest event bus.
//!
//! In-process publish/subscribe hub for pipeline lifecycle notifications:
//!
//! - [`EventBus`] — fan-out hub backed by `tokio::sync::broadcast`.
//! - [`PipelineEvent`] — the canonical event envelope.
//! - [`names`] — well-known event type constants.

pub mod bus;
pub mod names;

pub use bus::{EventBus, PipelineEvent};
