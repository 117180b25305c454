//! Tempest pipeline worker: configuration and runtime assembly for the
//! long-running binary that drives every processing queue.

pub mod config;
pub mod runtime;

pub use config::WorkerConfig;
