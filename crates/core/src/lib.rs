//! Shared primitives for the Tempest processing platform.
//!
//! This crate holds the pieces every other crate needs:
//!
//! - [`types`] — scalar type aliases (`DbId`, `Timestamp`).
//! - [`error`] — the domain error enum shared across crates.
//! - [`artifacts`] — content-addressed artifact naming and on-disk layout.

pub mod artifacts;
pub mod error;
pub mod types;

pub use error::CoreError;
pub use types::{DbId, Timestamp};
