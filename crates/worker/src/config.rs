//! Worker configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the worker process.
///
/// Service endpoints are required and panic at startup when absent;
/// tunables fall back to defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root directory of the artifact tree.
    pub artifact_root: PathBuf,
    /// Blur service endpoint.
    pub blur_api_url: String,
    /// Bearer token for the blur service.
    pub blur_api_token: String,
    /// Panorama provider base URL.
    pub street_view_api_url: String,
    /// Analysis service base URL.
    pub analysis_api_url: String,
    /// Point-cloud converter executable.
    pub converter_program: PathBuf,
    /// Wall-clock budget for one conversion run.
    pub conversion_timeout: Duration,
    /// Analysis service status-poll cadence.
    pub poll_interval: Duration,
    /// Analysis service status-poll budget.
    pub poll_timeout: Duration,
    /// Claim-loop cadence per queue.
    pub queue_poll_interval: Duration,
    /// Concurrent executions on queues without a dedicated limit.
    pub concurrency: usize,
    /// Maximum blur job starts per rate window.
    pub blur_rate_limit: u32,
    /// Maximum panorama lookups per rate window.
    pub lookup_rate_limit: u32,
    /// Length of both rate windows.
    pub rate_window: Duration,
    /// Claimed jobs older than this are returned to Pending.
    pub visibility_timeout: Duration,
    /// Delay between stale-claim sweeps.
    pub sweep_interval: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                       | Default            |
    /// |-------------------------------|--------------------|
    /// | `ARTIFACT_ROOT`               | `artifacts`        |
    /// | `BLUR_API_URL`                | required           |
    /// | `BLUR_API_TOKEN`              | required           |
    /// | `STREET_VIEW_API_URL`         | required           |
    /// | `ANALYSIS_API_URL`            | required           |
    /// | `POINT_CLOUD_CONVERTER`       | `PotreeConverter`  |
    /// | `CONVERSION_TIMEOUT_SECS`     | `600`              |
    /// | `ANALYSIS_POLL_INTERVAL_SECS` | `10`               |
    /// | `ANALYSIS_POLL_TIMEOUT_SECS`  | `600`              |
    /// | `QUEUE_POLL_INTERVAL_MS`      | `500`              |
    /// | `WORKER_CONCURRENCY`          | `4`                |
    /// | `BLUR_RATE_LIMIT`             | `10`               |
    /// | `LOOKUP_RATE_LIMIT`           | `30`               |
    /// | `RATE_WINDOW_SECS`            | `60`               |
    /// | `JOB_VISIBILITY_TIMEOUT_SECS` | `600`              |
    /// | `STALE_SWEEP_INTERVAL_SECS`   | `60`               |
    pub fn from_env() -> Self {
        Self {
            artifact_root: var_or("ARTIFACT_ROOT", "artifacts").into(),
            blur_api_url: required("BLUR_API_URL"),
            blur_api_token: required("BLUR_API_TOKEN"),
            street_view_api_url: required("STREET_VIEW_API_URL"),
            analysis_api_url: required("ANALYSIS_API_URL"),
            converter_program: var_or("POINT_CLOUD_CONVERTER", "PotreeConverter").into(),
            conversion_timeout: Duration::from_secs(parsed("CONVERSION_TIMEOUT_SECS", 600)),
            poll_interval: Duration::from_secs(parsed("ANALYSIS_POLL_INTERVAL_SECS", 10)),
            poll_timeout: Duration::from_secs(parsed("ANALYSIS_POLL_TIMEOUT_SECS", 600)),
            queue_poll_interval: Duration::from_millis(parsed("QUEUE_POLL_INTERVAL_MS", 500)),
            concurrency: parsed("WORKER_CONCURRENCY", 4_u64) as usize,
            blur_rate_limit: parsed("BLUR_RATE_LIMIT", 10_u64) as u32,
            lookup_rate_limit: parsed("LOOKUP_RATE_LIMIT", 30_u64) as u32,
            rate_window: Duration::from_secs(parsed("RATE_WINDOW_SECS", 60)),
            visibility_timeout: Duration::from_secs(parsed("JOB_VISIBILITY_TIMEOUT_SECS", 600)),
            sweep_interval: Duration::from_secs(parsed("STALE_SWEEP_INTERVAL_SECS", 60)),
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set"))
}

fn parsed(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .map(|raw| {
            raw.parse()
                .unwrap_or_else(|_| panic!("{name} must be a valid integer, got '{raw}'"))
        })
        .unwrap_or(default)
}
