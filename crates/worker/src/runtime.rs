//! Assembly of the pipeline from configuration: per-queue tuning, the
//! shared handler context, and the event-log subscriber.

use std::sync::Arc;

use tokio::sync::broadcast;

use tempest_compute::{AnalysisClient, BlurClient, PollConfig, StreetViewClient};
use tempest_core::artifacts::ArtifactLayout;
use tempest_events::PipelineEvent;
use tempest_pipeline::store::EntityStore;
use tempest_pipeline::{
    ConverterConfig, PipelineContext, QueueName, RateLimit, WorkerOptions,
};

use crate::config::WorkerConfig;

/// Per-queue worker tuning.
///
/// The blur queue runs serialized (its handler overwrites capture files
/// in place) and both externally metered services get a rate limiter;
/// the point-cloud queue runs one conversion at a time so a single
/// converter process owns the machine's cores.
pub fn queue_options(config: &WorkerConfig) -> Vec<WorkerOptions> {
    QueueName::ALL
        .iter()
        .map(|&queue| {
            let mut options = WorkerOptions::new(queue);
            options.poll_interval = config.queue_poll_interval;
            options.concurrency = match queue {
                QueueName::Blur | QueueName::PointCloud => 1,
                _ => config.concurrency,
            };
            options.rate_limit = match queue {
                QueueName::Blur => Some(RateLimit {
                    max_starts: config.blur_rate_limit,
                    window: config.rate_window,
                }),
                QueueName::PanoramaLookup => Some(RateLimit {
                    max_starts: config.lookup_rate_limit,
                    window: config.rate_window,
                }),
                _ => None,
            };
            options
        })
        .collect()
}

/// Build the shared handler context. All service clients reuse one
/// `reqwest` connection pool.
pub fn build_context(config: &WorkerConfig, store: Arc<dyn EntityStore>) -> PipelineContext {
    let http = reqwest::Client::new();

    let mut converter = ConverterConfig::new(config.converter_program.clone());
    converter.timeout = config.conversion_timeout;

    PipelineContext {
        store,
        layout: ArtifactLayout::new(config.artifact_root.clone()),
        blur: BlurClient::with_client(
            http.clone(),
            config.blur_api_url.clone(),
            config.blur_api_token.clone(),
        ),
        street_view: StreetViewClient::with_client(
            http.clone(),
            config.street_view_api_url.clone(),
        ),
        analysis: AnalysisClient::with_client(http, config.analysis_api_url.clone()),
        poll: PollConfig {
            interval: config.poll_interval,
            timeout: config.poll_timeout,
        },
        converter,
    }
}

/// Log every pipeline event until the bus closes.
pub async fn log_events(mut rx: broadcast::Receiver<PipelineEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                tracing::info!(
                    event = %event.event_type,
                    entity = event.source_entity_type.as_deref().unwrap_or("-"),
                    entity_id = event.source_entity_id,
                    payload = %event.payload,
                    "Pipeline event",
                );
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event log fell behind the bus");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
