//! Point-cloud queue handler: run the external converter over a scan.
//!
//! The converter is an opaque executable invoked with the scan file and
//! an output directory. Its stdout and stderr are captured to a
//! `-conversion.log` next to the scan regardless of outcome; the log is
//! written before the scan's terminal status, so a Complete scan always
//! has one.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use tempest_core::types::DbId;
use tempest_db::models::status::ProcessStatus;

use super::HandlerError;
use crate::context::{ConverterConfig, PipelineContext};
use crate::task::WorkerResult;

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

pub async fn handle(ctx: &PipelineContext, scan_id: DbId) -> Result<WorkerResult, HandlerError> {
    let store = ctx.store.as_ref();

    let Some(scan) = store.scan(scan_id).await? else {
        tracing::warn!(scan_id, "Conversion job for missing scan");
        return Ok(WorkerResult::failed("scan not found"));
    };

    // Terminal scans are done; a redelivered job must not re-run the
    // converter over finished output.
    if ProcessStatus::from_id(scan.status_id).is_some_and(|s| s.is_terminal()) {
        tracing::info!(scan_id, "Scan already settled, skipping conversion");
        return Ok(WorkerResult::ok());
    }

    store
        .set_scan_status(scan_id, ProcessStatus::InProgress)
        .await?;

    let scan_file = ctx.layout.scan_file(&scan.file_name);
    let output_dir = ctx.layout.conversion_output_dir(&scan.file_name);
    tokio::fs::create_dir_all(&output_dir).await?;

    let outcome = run_converter(&ctx.converter, &scan_file, &output_dir).await;

    let log_file = ctx.layout.conversion_log(&scan.file_name);
    tokio::fs::write(&log_file, render_log(&ctx.converter, &outcome)).await?;

    match outcome {
        Ok(conversion) if conversion.timed_out => {
            tracing::error!(
                scan_id,
                elapsed_secs = conversion.elapsed.as_secs(),
                "Converter timed out",
            );
            store.set_scan_status(scan_id, ProcessStatus::Failed).await?;
            Ok(WorkerResult::failed(format!(
                "converter timed out after {}s",
                conversion.elapsed.as_secs()
            )))
        }
        Ok(conversion) => match conversion.exit_code {
            Some(0) => {
                store
                    .set_scan_status(scan_id, ProcessStatus::Complete)
                    .await?;
                tracing::info!(
                    scan_id,
                    elapsed_ms = conversion.elapsed.as_millis() as u64,
                    "Scan converted",
                );
                Ok(WorkerResult::ok())
            }
            Some(code) => {
                tracing::error!(scan_id, exit_code = code, "Converter failed");
                store.set_scan_status(scan_id, ProcessStatus::Failed).await?;
                Ok(WorkerResult::failed(format!(
                    "converter exited with status {code}"
                )))
            }
            None => {
                tracing::error!(scan_id, "Converter killed by signal");
                store.set_scan_status(scan_id, ProcessStatus::Failed).await?;
                Ok(WorkerResult::failed("converter killed by signal"))
            }
        },
        Err(err) => {
            tracing::error!(scan_id, error = %err, "Converter could not be run");
            store.set_scan_status(scan_id, ProcessStatus::Failed).await?;
            Ok(WorkerResult::failed(format!("converter spawn failed: {err}")))
        }
    }
}

/// Captured result of one converter run.
struct Conversion {
    timed_out: bool,
    exit_code: Option<i32>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    elapsed: Duration,
}

/// Spawn the converter, capture both output streams, and enforce the
/// wall-clock timeout. On timeout the child is dropped, which kills the
/// process via `kill_on_drop`; partial output is still collected.
async fn run_converter(
    config: &ConverterConfig,
    scan_file: &Path,
    output_dir: &Path,
) -> std::io::Result<Conversion> {
    let mut cmd = Command::new(&config.program);
    cmd.arg(scan_file)
        .arg(output_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started = Instant::now();
    let mut child = cmd.spawn()?;

    // Read both streams in spawned tasks so `child.wait()` can borrow
    // the child mutably.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    match tokio::time::timeout(config.timeout, child.wait()).await {
        Ok(Ok(status)) => Ok(Conversion {
            timed_out: false,
            exit_code: status.code(),
            stdout: stdout_task.await.unwrap_or_default(),
            stderr: stderr_task.await.unwrap_or_default(),
            elapsed: started.elapsed(),
        }),
        Ok(Err(err)) => Err(err),
        Err(_elapsed) => {
            // Kills the process: kill_on_drop(true).
            drop(child);
            Ok(Conversion {
                timed_out: true,
                exit_code: None,
                stdout: stdout_task.await.unwrap_or_default(),
                stderr: stderr_task.await.unwrap_or_default(),
                elapsed: started.elapsed(),
            })
        }
    }
}

/// Read an entire output stream, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

fn render_log(config: &ConverterConfig, outcome: &std::io::Result<Conversion>) -> Vec<u8> {
    let mut log = Vec::new();
    log.extend_from_slice(format!("converter: {}\n", config.program.display()).as_bytes());
    match outcome {
        Ok(conversion) => {
            let exit = if conversion.timed_out {
                format!("timed out after {}s", conversion.elapsed.as_secs())
            } else {
                match conversion.exit_code {
                    Some(code) => format!("exit {code}"),
                    None => "killed by signal".to_string(),
                }
            };
            log.extend_from_slice(
                format!("result: {exit} ({}ms)\n", conversion.elapsed.as_millis()).as_bytes(),
            );
            log.extend_from_slice(b"\n--- stdout ---\n");
            log.extend_from_slice(&conversion.stdout);
            log.extend_from_slice(b"\n--- stderr ---\n");
            log.extend_from_slice(&conversion.stderr);
        }
        Err(err) => {
            log.extend_from_slice(format!("result: failed to start ({err})\n").as_bytes());
        }
    }
    log
}
