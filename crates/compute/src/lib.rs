//! Typed HTTP clients for the external processing services.
//!
//! Three slow services sit behind these clients:
//!
//! - [`AnalysisClient`] — the hailpad analysis service, spoken to with an
//!   upload-then-poll protocol (depth map rendering and dent detection).
//! - [`BlurClient`] — the blur removal API for capture images.
//! - [`StreetViewClient`] — the street-view panorama metadata provider.
//!
//! All clients share [`ComputeError`] and accept an existing
//! [`reqwest::Client`] for connection pooling across services.

pub mod analysis;
pub mod blur;
pub mod error;
pub mod street_view;

pub use analysis::{AnalysisClient, AnalysisResult, DentMeasurement, PollConfig, StatusResponse};
pub use blur::BlurClient;
pub use error::ComputeError;
pub use street_view::{PanoramaMetadata, StreetViewClient};
