use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tempest_events::EventBus;
use tempest_pipeline::store::PgStore;
use tempest_pipeline::{Pipeline, Reaper, Worker};
use tempest_worker::{runtime, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tempest_worker=debug,tempest_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    tracing::info!(
        artifact_root = %config.artifact_root.display(),
        concurrency = config.concurrency,
        "Loaded worker configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = tempest_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    tempest_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    tempest_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Pipeline context ---
    let store = Arc::new(PgStore::new(pool));
    let ctx = Arc::new(runtime::build_context(&config, store.clone()));
    let handler = Arc::new(Pipeline::new(Arc::clone(&ctx)));

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let event_log_handle = tokio::spawn(runtime::log_events(event_bus.subscribe()));

    // --- Queue workers ---
    let cancel = CancellationToken::new();
    let mut handles = Vec::new();
    for options in runtime::queue_options(&config) {
        let worker = Worker::new(
            store.clone(),
            handler.clone(),
            Arc::clone(&event_bus),
            options,
        );
        let worker_cancel = cancel.clone();
        handles.push(tokio::spawn(async move { worker.run(worker_cancel).await }));
    }

    // --- Stale-claim reaper ---
    let reaper = Reaper::new(
        store.clone(),
        Arc::clone(&event_bus),
        config.visibility_timeout,
    )
    .with_sweep_interval(config.sweep_interval);
    let reaper_cancel = cancel.clone();
    handles.push(tokio::spawn(async move { reaper.run(reaper_cancel).await }));

    tracing::info!("Queue workers and stale-claim reaper running");

    // --- Shutdown ---
    shutdown_signal().await;
    cancel.cancel();

    for handle in handles {
        let _ = tokio::time::timeout(Duration::from_secs(10), handle).await;
    }
    tracing::info!("Queue workers stopped");

    // Dropping the last bus handle closes the broadcast channel, which
    // ends the event log task.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), event_log_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the worker
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
