//! Shared scenario plumbing: an in-memory store, mock external
//! services on ephemeral ports, a temp artifact tree, and real workers.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path as UrlPath, Query};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use tempest_compute::{AnalysisClient, BlurClient, PollConfig, StreetViewClient};
use tempest_core::artifacts::ArtifactLayout;
use tempest_events::EventBus;
use tempest_pipeline::{
    ConverterConfig, MemoryStore, Pipeline, PipelineContext, QueueName, Worker, WorkerOptions,
};

/// Serve `app` on an ephemeral port and return its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });
    format!("http://{addr}")
}

// ---------------------------------------------------------------------------
// Mock services
// ---------------------------------------------------------------------------

/// Marker prepended by the blur mock, so tests can tell a processed
/// artifact from the original upload.
pub const BLUR_MARK: &[u8] = b"blurred:";

async fn first_file(mut multipart: Multipart) -> (String, Vec<u8>) {
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.expect("field bytes").to_vec();
        return (name, bytes);
    }
    panic!("upload carried no file part");
}

/// Blur service that succeeds for every upload, echoing the image back
/// with [`BLUR_MARK`] prepended.
pub fn blur_ok() -> Router {
    Router::new().route(
        "/",
        post(|multipart: Multipart| async move {
            let (_, bytes) = first_file(multipart).await;
            [BLUR_MARK, bytes.as_slice()].concat()
        }),
    )
}

/// Blur service that rejects exactly one file name and processes the
/// rest.
pub fn blur_failing_for(target: &str) -> Router {
    let target = target.to_string();
    Router::new().route(
        "/",
        post(move |multipart: Multipart| {
            let target = target.clone();
            async move {
                let (name, bytes) = first_file(multipart).await;
                if name == target {
                    return (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "gpu oom")
                        .into_response();
                }
                [BLUR_MARK, bytes.as_slice()].concat().into_response()
            }
        }),
    )
}

#[derive(serde::Deserialize)]
struct LookupQuery {
    lat: f64,
    lng: f64,
}

/// Panorama provider reporting coverage wherever `lat > 0`, with an
/// external id derived from the coordinates.
pub fn street_view_northern_coverage() -> Router {
    Router::new().route(
        "/panorama",
        get(|Query(q): Query<LookupQuery>| async move {
            if q.lat <= 0.0 {
                return Json(serde_json::Value::Null);
            }
            Json(serde_json::json!({
                "id": format!("pano-{:.4}-{:.4}", q.lat, q.lng),
                "lat": q.lat,
                "lon": q.lng,
                "heading": 90.0,
                "pitch": 0.5,
                "roll": 0.0,
                "date": "2021-08",
                "elevation": 230.0
            }))
        }),
    )
}

/// Panorama provider with no coverage anywhere.
pub fn street_view_no_coverage() -> Router {
    Router::new().route(
        "/panorama",
        get(|| async { Json(serde_json::Value::Null) }),
    )
}

/// Depth-map PNG served by the analysis mock.
pub const DEPTH_MAP_BYTES: &[u8] = b"\x89PNG depth";

/// Analysis service whose tasks settle on the first status poll and
/// whose results are [`DEPTH_MAP_BYTES`] and the given dent list.
pub fn analysis_ok(dents: serde_json::Value) -> Router {
    Router::new()
        .route(
            "/upload",
            post(|multipart: Multipart| async move {
                let (name, _) = first_file(multipart).await;
                Json(serde_json::json!({"taskId": format!("task-{name}")}))
            }),
        )
        .route(
            "/status/{task_id}",
            get(|UrlPath(_): UrlPath<String>| async {
                Json(serde_json::json!({"success": true, "message": null}))
            }),
        )
        .route(
            "/result/{task_id}",
            get(
                |UrlPath(_): UrlPath<String>,
                 Query(q): Query<std::collections::HashMap<String, String>>| async move {
                    match q.get("type").map(String::as_str) {
                        Some("depth_map") => DEPTH_MAP_BYTES.to_vec().into_response(),
                        Some("analysis") => Json(serde_json::json!({"dents": dents})).into_response(),
                        other => panic!("unexpected result type {other:?}"),
                    }
                },
            ),
        )
}

/// Analysis service whose tasks accept uploads but never settle.
pub fn analysis_never_settles() -> Router {
    Router::new()
        .route(
            "/upload",
            post(|_: Multipart| async { Json(serde_json::json!({"taskId": "task-stuck"})) }),
        )
        .route(
            "/status/{task_id}",
            get(|UrlPath(_): UrlPath<String>| async {
                Json(serde_json::json!({"success": true, "message": "rendering"}))
            }),
        )
}

pub fn two_dents() -> serde_json::Value {
    serde_json::json!([
        {
            "angle": 15.0,
            "centroidX": 100.5,
            "centroidY": 240.25,
            "majorAxis": 9.0,
            "minorAxis": 6.5,
            "maxDepth": 0.62
        },
        {
            "angle": 270.0,
            "centroidX": 412.0,
            "centroidY": 16.75,
            "majorAxis": 4.25,
            "minorAxis": 4.0,
            "maxDepth": 0.31
        }
    ])
}

// ---------------------------------------------------------------------------
// Scenario rig
// ---------------------------------------------------------------------------

/// One self-contained pipeline instance: in-memory store, temp artifact
/// tree, and clients wired to the given mock services.
pub struct TestRig {
    pub store: Arc<MemoryStore>,
    pub ctx: Arc<PipelineContext>,
    pub events: Arc<EventBus>,
    // Dropping it deletes the artifact tree.
    _artifacts: TempDir,
}

impl TestRig {
    pub async fn new(blur: Router, street_view: Router, analysis: Router) -> Self {
        Self::with_converter(blur, street_view, analysis, ConverterConfig::new("/bin/true")).await
    }

    pub async fn with_converter(
        blur: Router,
        street_view: Router,
        analysis: Router,
        converter: ConverterConfig,
    ) -> Self {
        let artifacts = TempDir::new().expect("temp artifact root");
        let store = Arc::new(MemoryStore::new());

        let ctx = Arc::new(PipelineContext {
            store: store.clone(),
            layout: ArtifactLayout::new(artifacts.path()),
            blur: BlurClient::new(spawn_server(blur).await, "test-token".to_string()),
            street_view: StreetViewClient::new(spawn_server(street_view).await),
            analysis: AnalysisClient::new(spawn_server(analysis).await),
            poll: PollConfig {
                interval: Duration::from_millis(10),
                timeout: Duration::from_millis(200),
            },
            converter,
        });

        Self {
            store,
            ctx,
            events: Arc::new(EventBus::default()),
            _artifacts: artifacts,
        }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.ctx.layout
    }

    /// Start one worker per queue against the real [`Pipeline`] handler.
    pub fn start_workers(&self, queues: &[QueueName]) -> WorkerSet {
        let cancel = CancellationToken::new();
        let handler = Arc::new(Pipeline::new(self.ctx.clone()));
        let handles = queues
            .iter()
            .map(|&queue| {
                let mut options = WorkerOptions::new(queue);
                options.poll_interval = Duration::from_millis(10);
                if queue == QueueName::Blur {
                    options.concurrency = 1;
                }
                let worker = Worker::new(
                    self.store.clone(),
                    handler.clone(),
                    self.events.clone(),
                    options,
                );
                let cancel = cancel.clone();
                tokio::spawn(async move { worker.run(cancel).await })
            })
            .collect();
        WorkerSet { cancel, handles }
    }
}

/// Handles to running workers; shut down before asserting final state
/// that depends on in-flight jobs having drained.
pub struct WorkerSet {
    cancel: CancellationToken,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerSet {
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            handle.await.expect("worker task");
        }
    }
}

/// Poll a condition until it holds or two seconds pass. Panics on
/// timeout so failures point at the stalled condition.
macro_rules! wait_until {
    ($what:expr, $cond:expr) => {{
        let started = tokio::time::Instant::now();
        loop {
            let satisfied = $cond;
            if satisfied {
                break;
            }
            if started.elapsed() >= std::time::Duration::from_secs(2) {
                panic!("timed out waiting for {}", $what);
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }};
}
pub(crate) use wait_until;

/// Write a file, creating parent directories.
pub async fn put_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.expect("mkdir");
    }
    tokio::fs::write(path, bytes).await.expect("write file");
}
