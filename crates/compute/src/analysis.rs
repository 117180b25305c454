//! Client for the hailpad analysis service.
//!
//! The service runs long jobs (depth map rendering, dent detection) behind
//! an upload-then-poll protocol:
//!
//! 1. `POST /upload` with the scan file — returns a `taskId`.
//! 2. `GET /status/{taskId}` — polled until the task settles.
//! 3. `GET /result/{taskId}?type=…` — the finished artifact.
//!
//! While a task is still running the service answers
//! `{"success": true, "message": "<progress note>"}`; a cleared `message`
//! means the task is done. `{"success": false, …}` is a hard failure.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{ensure_success, ComputeError};

/// How often `/status` is polled between attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Wall-clock budget for one task before the poll gives up.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);

/// Tunable poll timing, shortened in tests.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Response from `GET /status/{taskId}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    /// Progress note while running; cleared once the task settles.
    pub message: Option<String>,
}

impl StatusResponse {
    /// The canonical readiness predicate: the task reported success and
    /// no longer carries a progress note.
    pub fn is_settled(&self) -> bool {
        self.success && self.message.is_none()
    }
}

/// Response from `POST /upload`.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "taskId")]
    task_id: Option<String>,
    error: Option<String>,
}

/// One detected dent as reported by the analysis service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DentMeasurement {
    pub angle: f64,
    pub centroid_x: f64,
    pub centroid_y: f64,
    pub major_axis: f64,
    pub minor_axis: f64,
    pub max_depth: f64,
}

/// Parsed body of `GET /result/{taskId}?type=analysis`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisResult {
    pub dents: Vec<DentMeasurement>,
}

/// HTTP client for the analysis service.
pub struct AnalysisClient {
    client: reqwest::Client,
    base_url: String,
}

impl AnalysisClient {
    /// Create a new client for the service at `base_url`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (connection pooling across services).
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Upload a scan for processing. Returns the server-assigned task id.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ComputeError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let upload: UploadResponse = response.json().await?;
        if let Some(error) = upload.error {
            return Err(ComputeError::Service(error));
        }
        upload
            .task_id
            .ok_or_else(|| ComputeError::Decode("upload response missing taskId".to_string()))
    }

    /// Poll `/status/{taskId}` until `is_ready` accepts a successful
    /// status, the service reports failure, or the wall-clock budget in
    /// `config` runs out.
    ///
    /// Single-attempt transport errors are logged and treated as
    /// not-ready; the deadline is enforced independently of any
    /// per-request timeout, so a flapping service cannot stall the
    /// worker forever.
    pub async fn poll_status<F>(
        &self,
        task_id: &str,
        is_ready: F,
        config: PollConfig,
    ) -> Result<StatusResponse, ComputeError>
    where
        F: Fn(&StatusResponse) -> bool,
    {
        let started = tokio::time::Instant::now();
        loop {
            match self.fetch_status(task_id).await {
                Ok(status) => {
                    if !status.success {
                        let message = status
                            .message
                            .unwrap_or_else(|| "no failure detail provided".to_string());
                        return Err(ComputeError::Service(message));
                    }
                    if is_ready(&status) {
                        return Ok(status);
                    }
                    tracing::debug!(task_id, message = ?status.message, "task still running");
                }
                Err(ComputeError::Request(err)) => {
                    tracing::warn!(task_id, error = %err, "status poll attempt failed");
                }
                Err(other) => return Err(other),
            }

            if started.elapsed() >= config.timeout {
                return Err(ComputeError::Timeout {
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(config.interval).await;
        }
    }

    /// Fetch the rendered depth map PNG for a finished task.
    pub async fn fetch_depth_map(&self, task_id: &str) -> Result<Vec<u8>, ComputeError> {
        let response = self.fetch_result(task_id, "depth_map").await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Fetch and parse the dent analysis for a finished task.
    pub async fn fetch_analysis(&self, task_id: &str) -> Result<AnalysisResult, ComputeError> {
        let response = self.fetch_result(task_id, "analysis").await?;
        Ok(response.json::<AnalysisResult>().await?)
    }

    // ---- private helpers ----

    async fn fetch_status(&self, task_id: &str) -> Result<StatusResponse, ComputeError> {
        let response = self
            .client
            .get(format!("{}/status/{}", self.base_url, task_id))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<StatusResponse>().await?)
    }

    async fn fetch_result(
        &self,
        task_id: &str,
        kind: &str,
    ) -> Result<reqwest::Response, ComputeError> {
        let response = self
            .client
            .get(format!("{}/result/{}", self.base_url, task_id))
            .query(&[("type", kind)])
            .send()
            .await?;
        ensure_success(response).await
    }
}
