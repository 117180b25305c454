//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts where the row is built by callers

pub mod capture;
pub mod dent;
pub mod hailpad;
pub mod job;
pub mod panorama;
pub mod path;
pub mod scan;
pub mod segment;
pub mod status;
