//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod capture_repo;
pub mod dent_repo;
pub mod hailpad_repo;
pub mod job_repo;
pub mod panorama_repo;
pub mod path_repo;
pub mod scan_repo;
pub mod segment_repo;

pub use capture_repo::CaptureRepo;
pub use dent_repo::DentRepo;
pub use hailpad_repo::HailpadRepo;
pub use job_repo::JobRepo;
pub use panorama_repo::PanoramaRepo;
pub use path_repo::PathRepo;
pub use scan_repo::ScanRepo;
pub use segment_repo::SegmentRepo;
