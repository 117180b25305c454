//! Point-cloud conversion through a real subprocess: fake converter
//! scripts standing in for the external binary.

mod common;

use std::path::{Path, PathBuf};

use axum::Router;
use common::*;
use tempest_core::types::DbId;
use tempest_db::models::scan::{CreateScan, Scan};
use tempest_db::models::status::ProcessStatus;
use tempest_pipeline::{ConverterConfig, EntityStore, JobQueue, QueueName, Task};

const SCAN_FILE: &str = "pts.laz";
const SCAN_BYTES: &[u8] = b"lidar-point-soup";

/// Write an executable converter script and return its path.
fn write_converter(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("convert.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod script");
    path
}

async fn rig_with_converter(converter: ConverterConfig) -> TestRig {
    TestRig::with_converter(Router::new(), Router::new(), Router::new(), converter).await
}

async fn seed_scan(rig: &TestRig, with_file: bool) -> Scan {
    let scan = rig
        .store
        .create_scan(CreateScan {
            name: "Roof ridge".to_string(),
            file_name: SCAN_FILE.to_string(),
            size_bytes: SCAN_BYTES.len() as i64,
        })
        .await
        .expect("create scan");
    if with_file {
        put_file(&rig.layout().scan_file(SCAN_FILE), SCAN_BYTES).await;
    }
    scan
}

async fn run_conversion(rig: &TestRig, scan_id: DbId) -> DbId {
    let job = rig
        .store
        .enqueue(&Task::PointCloud { scan_id })
        .await
        .unwrap();
    let workers = rig.start_workers(&[QueueName::PointCloud]);
    wait_until!("conversion job to settle", {
        let counts = rig.store.counts(QueueName::PointCloud).await.unwrap();
        counts.completed + counts.failed == 1
    });
    workers.shutdown().await;
    job.id
}

async fn scan_status(rig: &TestRig, id: DbId) -> ProcessStatus {
    let scan = rig.store.scan(id).await.unwrap().unwrap();
    ProcessStatus::from_id(scan.status_id).expect("known status")
}

async fn read_log(rig: &TestRig) -> String {
    let bytes = tokio::fs::read(rig.layout().conversion_log(SCAN_FILE))
        .await
        .expect("conversion log exists");
    String::from_utf8_lossy(&bytes).into_owned()
}

// ---------------------------------------------------------------------------
// Test: clean conversion
// ---------------------------------------------------------------------------

/// A converter that exits 0 completes the scan, and its output and
/// captured stdout are where the layout says they are.
#[tokio::test]
async fn successful_conversion_completes_scan_and_writes_log() {
    let scripts = tempfile::tempdir().expect("script dir");
    let program = write_converter(
        scripts.path(),
        "cp \"$1\" \"$2/cloud.xyz\"\necho \"converted $1\"",
    );

    let rig = rig_with_converter(ConverterConfig::new(program)).await;
    let scan = seed_scan(&rig, true).await;
    run_conversion(&rig, scan.id).await;

    assert_eq!(scan_status(&rig, scan.id).await, ProcessStatus::Complete);

    let converted = tokio::fs::read(rig.layout().conversion_output_dir(SCAN_FILE).join("cloud.xyz"))
        .await
        .expect("converted output exists");
    assert_eq!(converted, SCAN_BYTES);

    let log = read_log(&rig).await;
    assert!(log.contains("result: exit 0"));
    assert!(log.contains("converted"));
}

// ---------------------------------------------------------------------------
// Test: converter reports an error
// ---------------------------------------------------------------------------

/// A nonzero exit fails the scan; stderr and the exit code are kept in
/// the conversion log and the job error names the status.
#[tokio::test]
async fn failing_converter_fails_scan_and_keeps_stderr() {
    let scripts = tempfile::tempdir().expect("script dir");
    let program = write_converter(scripts.path(), "echo \"bad header\" >&2\nexit 3");

    let rig = rig_with_converter(ConverterConfig::new(program)).await;
    let scan = seed_scan(&rig, true).await;
    let job_id = run_conversion(&rig, scan.id).await;

    assert_eq!(scan_status(&rig, scan.id).await, ProcessStatus::Failed);

    let log = read_log(&rig).await;
    assert!(log.contains("result: exit 3"));
    assert!(log.contains("bad header"));

    let job = rig.store.job(job_id).await.unwrap().unwrap();
    assert!(job
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("converter exited with status 3")));
}

// ---------------------------------------------------------------------------
// Test: wall-clock timeout
// ---------------------------------------------------------------------------

/// A converter that outlives its budget is killed; the scan fails and
/// the log records the timeout.
#[tokio::test]
async fn hung_converter_is_killed_and_scan_fails() {
    let scripts = tempfile::tempdir().expect("script dir");
    let program = write_converter(scripts.path(), "sleep 30");

    let mut converter = ConverterConfig::new(program);
    converter.timeout = std::time::Duration::from_millis(100);
    let rig = rig_with_converter(converter).await;
    let scan = seed_scan(&rig, true).await;
    let job_id = run_conversion(&rig, scan.id).await;

    assert_eq!(scan_status(&rig, scan.id).await, ProcessStatus::Failed);
    assert!(read_log(&rig).await.contains("timed out after"));

    let job = rig.store.job(job_id).await.unwrap().unwrap();
    assert!(job
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("converter timed out")));
}

// ---------------------------------------------------------------------------
// Test: converter binary missing
// ---------------------------------------------------------------------------

/// A converter that cannot even start still leaves a log and a failed
/// scan, not a wedged job.
#[tokio::test]
async fn unspawnable_converter_fails_scan() {
    let rig = rig_with_converter(ConverterConfig::new("/nonexistent/converter")).await;
    let scan = seed_scan(&rig, true).await;
    let job_id = run_conversion(&rig, scan.id).await;

    assert_eq!(scan_status(&rig, scan.id).await, ProcessStatus::Failed);
    assert!(read_log(&rig).await.contains("failed to start"));

    let job = rig.store.job(job_id).await.unwrap().unwrap();
    assert!(job
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("converter spawn failed")));
}
