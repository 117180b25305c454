//! Shared dependencies every handler runs against.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempest_compute::{AnalysisClient, BlurClient, PollConfig, StreetViewClient};
use tempest_core::artifacts::ArtifactLayout;

use crate::store::EntityStore;

/// Default wall-clock budget for one point-cloud conversion.
pub const DEFAULT_CONVERSION_TIMEOUT: Duration = Duration::from_secs(600);

/// The external converter executable and its execution budget.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Program invoked as `{program} {scan_file} {output_dir}`.
    pub program: PathBuf,
    pub timeout: Duration,
}

impl ConverterConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_CONVERSION_TIMEOUT,
        }
    }
}

/// Everything a handler needs: storage, artifact locations, and the
/// external service clients. One instance is shared by all workers.
pub struct PipelineContext {
    pub store: Arc<dyn EntityStore>,
    pub layout: ArtifactLayout,
    pub blur: BlurClient,
    pub street_view: StreetViewClient,
    pub analysis: AnalysisClient,
    pub poll: PollConfig,
    pub converter: ConverterConfig,
}
