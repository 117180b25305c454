//! Completion roll-ups from child statuses to parent statuses.
//!
//! Handlers never write a parent's overall status directly. They call
//! [`check_path_complete`] or [`check_hailpad_complete`] after their own
//! sub-status write; the check recomputes the parent's state from a fresh
//! snapshot and applies it through a conditional write. Both checks are
//! idempotent and safe to invoke redundantly or concurrently.

use tempest_core::types::DbId;
use tempest_db::models::segment::SegmentRollup;
use tempest_db::models::status::{ProcessStatus, ServiceStatus};

use crate::store::{EntityStore, StoreError};

/// What a path's children collectively imply about the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOutcome {
    /// At least one element is still pending or in flight.
    Incomplete,
    /// Everything settled and at least one element failed.
    Failed,
    /// Everything settled successfully; `size_bytes` is the sum over
    /// every owned capture, street-view captures included.
    Complete { size_bytes: i64 },
}

/// Evaluate a path's completion state from one consistent snapshot.
///
/// A path with no segments is never complete. A linked panorama whose
/// street-view capture row has not been created yet counts as a
/// non-terminal element, so the path cannot be promoted between the
/// lookup finishing and the street-view image being ingested.
pub fn evaluate_path(rollups: &[SegmentRollup]) -> PathOutcome {
    if rollups.is_empty() {
        return PathOutcome::Incomplete;
    }

    let mut any_failed = false;
    let mut size_bytes = 0i64;

    for rollup in rollups {
        match ServiceStatus::from_id(rollup.capture_status_id) {
            Some(ServiceStatus::Complete) => size_bytes += rollup.capture_size_bytes,
            Some(ServiceStatus::Failed) => any_failed = true,
            _ => return PathOutcome::Incomplete,
        }

        match ProcessStatus::from_id(rollup.panorama_status_id) {
            Some(ProcessStatus::Complete) => {}
            Some(ProcessStatus::Failed) => any_failed = true,
            _ => return PathOutcome::Incomplete,
        }

        match rollup.street_view_status_id {
            Some(status) => match ServiceStatus::from_id(status) {
                Some(ServiceStatus::Complete) => {
                    size_bytes += rollup.street_view_size_bytes.unwrap_or(0)
                }
                Some(ServiceStatus::Failed) => any_failed = true,
                _ => return PathOutcome::Incomplete,
            },
            None if rollup.panorama_id.is_some() => return PathOutcome::Incomplete,
            None => {}
        }
    }

    if any_failed {
        PathOutcome::Failed
    } else {
        PathOutcome::Complete { size_bytes }
    }
}

/// Recompute and apply a path's overall status.
///
/// Returns whether the path row changed. A missing row is a no-op: the
/// path may have been reset or deleted while the triggering job was in
/// flight.
pub async fn check_path_complete(
    store: &dyn EntityStore,
    path_id: DbId,
) -> Result<bool, StoreError> {
    let Some(path) = store.path(path_id).await? else {
        tracing::warn!(path_id, "Completion check on missing path");
        return Ok(false);
    };
    if ProcessStatus::from_id(path.status_id).is_some_and(|s| s.is_terminal()) {
        return Ok(false);
    }

    let rollups = store.segment_rollups(path_id).await?;
    match evaluate_path(&rollups) {
        PathOutcome::Incomplete => Ok(false),
        PathOutcome::Failed => {
            let changed = store.fail_path_if_active(path_id).await?;
            if changed {
                tracing::warn!(path_id, "Path failed: at least one capture or lookup failed");
            }
            Ok(changed)
        }
        PathOutcome::Complete { size_bytes } => {
            let changed = store.complete_path_if_active(path_id, size_bytes).await?;
            if changed {
                tracing::info!(path_id, size_bytes, "Path complete");
            }
            Ok(changed)
        }
    }
}

/// Recompute and apply a hailpad's overall status.
///
/// Promotion needs both sub-statuses Complete and a positive
/// human-entered `max_depth`; either sub-status Failed fails the
/// hailpad. The calibration route calls this too, so completion is
/// reached from whichever side arrives last.
pub async fn check_hailpad_complete(
    store: &dyn EntityStore,
    hailpad_id: DbId,
) -> Result<bool, StoreError> {
    let Some(hailpad) = store.hailpad(hailpad_id).await? else {
        tracing::warn!(hailpad_id, "Completion check on missing hailpad");
        return Ok(false);
    };
    if ProcessStatus::from_id(hailpad.status_id).is_some_and(|s| s.is_terminal()) {
        return Ok(false);
    }

    let depth_map = ServiceStatus::from_id(hailpad.depth_map_status_id);
    let analysis = ServiceStatus::from_id(hailpad.analysis_status_id);

    if depth_map == Some(ServiceStatus::Failed) || analysis == Some(ServiceStatus::Failed) {
        let changed = store.fail_hailpad_if_active(hailpad_id).await?;
        if changed {
            tracing::warn!(hailpad_id, "Hailpad failed: a processing stage failed");
        }
        return Ok(changed);
    }

    let calibrated = hailpad.max_depth.is_some_and(|d| d > 0.0);
    if depth_map == Some(ServiceStatus::Complete)
        && analysis == Some(ServiceStatus::Complete)
        && calibrated
    {
        let changed = store.complete_hailpad_if_active(hailpad_id).await?;
        if changed {
            tracing::info!(hailpad_id, "Hailpad complete");
        }
        return Ok(changed);
    }

    Ok(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use tempest_db::models::capture::CreateCapture;
    use tempest_db::models::path::CreatePath;
    use tempest_db::models::segment::CreatePathSegment;
    use tempest_db::models::status::CaptureSource;

    use crate::store::MemoryStore;

    fn rollup(
        capture: ServiceStatus,
        capture_size: i64,
        panorama: ProcessStatus,
        panorama_id: Option<i64>,
        street_view: Option<(ServiceStatus, i64)>,
    ) -> SegmentRollup {
        SegmentRollup {
            segment_id: 1,
            panorama_status_id: panorama.id(),
            panorama_id,
            capture_status_id: capture.id(),
            capture_size_bytes: capture_size,
            street_view_status_id: street_view.map(|(s, _)| s.id()),
            street_view_size_bytes: street_view.map(|(_, size)| size),
        }
    }

    // -- evaluate_path --

    #[test]
    fn empty_path_is_incomplete() {
        assert_eq!(evaluate_path(&[]), PathOutcome::Incomplete);
    }

    #[test]
    fn pending_capture_keeps_path_incomplete() {
        let rollups = [rollup(
            ServiceStatus::Pending,
            0,
            ProcessStatus::Complete,
            None,
            None,
        )];
        assert_eq!(evaluate_path(&rollups), PathOutcome::Incomplete);
    }

    #[test]
    fn pending_lookup_keeps_path_incomplete() {
        let rollups = [rollup(
            ServiceStatus::Complete,
            5,
            ProcessStatus::InProgress,
            None,
            None,
        )];
        assert_eq!(evaluate_path(&rollups), PathOutcome::Incomplete);
    }

    #[test]
    fn no_coverage_segment_completes_without_street_view() {
        let rollups = [rollup(
            ServiceStatus::Complete,
            5,
            ProcessStatus::Complete,
            None,
            None,
        )];
        assert_eq!(
            evaluate_path(&rollups),
            PathOutcome::Complete { size_bytes: 5 },
        );
    }

    #[test]
    fn linked_panorama_without_capture_row_keeps_path_open() {
        // Lookup found coverage but the street-view image has not been
        // ingested yet. The path must not promote in this window.
        let rollups = [rollup(
            ServiceStatus::Complete,
            5,
            ProcessStatus::Complete,
            Some(77),
            None,
        )];
        assert_eq!(evaluate_path(&rollups), PathOutcome::Incomplete);
    }

    #[test]
    fn sizes_sum_over_both_capture_kinds() {
        let rollups = [
            rollup(
                ServiceStatus::Complete,
                10,
                ProcessStatus::Complete,
                None,
                None,
            ),
            rollup(
                ServiceStatus::Complete,
                20,
                ProcessStatus::Complete,
                Some(77),
                Some((ServiceStatus::Complete, 30)),
            ),
        ];
        assert_eq!(
            evaluate_path(&rollups),
            PathOutcome::Complete { size_bytes: 60 },
        );
    }

    #[test]
    fn failure_only_surfaces_once_everything_settles() {
        // One failed capture, one still processing: stay incomplete.
        let rollups = [
            rollup(
                ServiceStatus::Failed,
                0,
                ProcessStatus::Complete,
                None,
                None,
            ),
            rollup(
                ServiceStatus::Processing,
                0,
                ProcessStatus::Complete,
                None,
                None,
            ),
        ];
        assert_eq!(evaluate_path(&rollups), PathOutcome::Incomplete);

        // The in-flight sibling settles: now the failure propagates.
        let rollups = [
            rollup(
                ServiceStatus::Failed,
                0,
                ProcessStatus::Complete,
                None,
                None,
            ),
            rollup(
                ServiceStatus::Complete,
                9,
                ProcessStatus::Complete,
                None,
                None,
            ),
        ];
        assert_eq!(evaluate_path(&rollups), PathOutcome::Failed);
    }

    #[test]
    fn failed_lookup_fails_the_path() {
        let rollups = [rollup(
            ServiceStatus::Complete,
            5,
            ProcessStatus::Failed,
            None,
            None,
        )];
        assert_eq!(evaluate_path(&rollups), PathOutcome::Failed);
    }

    #[test]
    fn failed_street_view_blur_fails_the_path() {
        let rollups = [rollup(
            ServiceStatus::Complete,
            5,
            ProcessStatus::Complete,
            Some(77),
            Some((ServiceStatus::Failed, 0)),
        )];
        assert_eq!(evaluate_path(&rollups), PathOutcome::Failed);
    }

    // -- check_path_complete --

    #[tokio::test]
    async fn repeated_checks_apply_the_rollup_once() {
        let store = MemoryStore::new();
        let path = store
            .create_path(CreatePath {
                name: "p".into(),
                folder: "f".into(),
            })
            .await
            .unwrap();
        let capture = store
            .create_capture(CreateCapture {
                file_name: "img.jpg".into(),
                source_id: CaptureSource::Device.id(),
                size_bytes: 5,
            })
            .await
            .unwrap();
        let segment = store
            .create_segment(CreatePathSegment {
                path_id: path.id,
                sequence_index: 0,
                capture_id: capture.id,
                lat: 0.0,
                lng: 0.0,
            })
            .await
            .unwrap();
        store
            .set_capture_status(capture.id, ServiceStatus::Complete)
            .await
            .unwrap();
        store
            .set_segment_panorama_status(segment.id, ProcessStatus::Complete)
            .await
            .unwrap();

        assert!(check_path_complete(&store, path.id).await.unwrap());
        // The second invocation finds a terminal path and changes nothing.
        assert!(!check_path_complete(&store, path.id).await.unwrap());

        let path = store.path(path.id).await.unwrap().unwrap();
        assert_eq!(path.status_id, ProcessStatus::Complete.id());
        assert_eq!(path.size_bytes, 5);
    }
}
