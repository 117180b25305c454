//! Content-addressed artifact naming and on-disk layout.
//!
//! Every uploaded binary is stored under a name derived from the SHA-256
//! of its bytes plus the original extension, so re-uploads of identical
//! content land on the same file and names never collide across entities.
//! The layout helpers centralize the directory scheme so handlers and
//! reset logic agree on where artifacts live.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// File name of the rendered depth map inside a hailpad folder.
pub const DEPTH_MAP_FILE_NAME: &str = "dmap.png";

/// Suffix appended to a scan's stem for its conversion log.
pub const CONVERSION_LOG_SUFFIX: &str = "-conversion.log";

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Derive a content-addressed file name: the SHA-256 hex of `data`,
/// keeping the extension of `original_name` when it has one.
pub fn hashed_file_name(data: &[u8], original_name: &str) -> String {
    let digest = sha256_hex(data);
    match Path::new(original_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{digest}.{ext}"),
        None => digest,
    }
}

/// The portion of a file name before its final extension.
pub fn file_stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file_name,
    }
}

/// Resolves artifact locations under a single configured root directory.
///
/// Layout:
/// - `paths/{folder}/{file_name}` — path capture images
/// - `hailpads/{folder}/{file_name}` — hailpad scan uploads
/// - `hailpads/{folder}/dmap.png` — rendered depth map
/// - `scans/{file_name}` — LiDAR uploads
/// - `scans/{stem}-conversion.log` — converter output capture
/// - `scans/{stem}/` — converted point-cloud output
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding all captures of one path.
    pub fn path_dir(&self, folder: &str) -> PathBuf {
        self.root.join("paths").join(folder)
    }

    /// A capture image inside a path folder.
    pub fn capture_file(&self, folder: &str, file_name: &str) -> PathBuf {
        self.path_dir(folder).join(file_name)
    }

    /// Directory holding one hailpad's scan and derived artifacts.
    pub fn hailpad_dir(&self, folder: &str) -> PathBuf {
        self.root.join("hailpads").join(folder)
    }

    /// A file inside a hailpad folder.
    pub fn hailpad_file(&self, folder: &str, file_name: &str) -> PathBuf {
        self.hailpad_dir(folder).join(file_name)
    }

    /// The rendered depth map for a hailpad.
    pub fn depth_map_file(&self, folder: &str) -> PathBuf {
        self.hailpad_dir(folder).join(DEPTH_MAP_FILE_NAME)
    }

    /// An uploaded LiDAR scan file.
    pub fn scan_file(&self, file_name: &str) -> PathBuf {
        self.root.join("scans").join(file_name)
    }

    /// Captured stdout/stderr of the point-cloud converter for a scan.
    pub fn conversion_log(&self, file_name: &str) -> PathBuf {
        let stem = file_stem(file_name);
        self.root
            .join("scans")
            .join(format!("{stem}{CONVERSION_LOG_SUFFIX}"))
    }

    /// Output directory the converter writes into for a scan.
    pub fn conversion_output_dir(&self, file_name: &str) -> PathBuf {
        self.root.join("scans").join(file_stem(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn consistent_output() {
        let data = b"hello world";
        assert_eq!(sha256_hex(data), sha256_hex(data));
        assert_eq!(sha256_hex(data).len(), 64);
    }

    #[test]
    fn hashed_name_keeps_extension() {
        let name = hashed_file_name(b"abc", "photo.JPG");
        assert!(name.ends_with(".JPG"));
        assert_eq!(name.len(), 64 + 4);
    }

    #[test]
    fn hashed_name_without_extension_is_bare_digest() {
        let name = hashed_file_name(b"abc", "rawdump");
        assert_eq!(name.len(), 64);
        assert!(!name.contains('.'));
    }

    #[test]
    fn stem_strips_final_extension_only() {
        assert_eq!(file_stem("a1b2.laz"), "a1b2");
        assert_eq!(file_stem("archive.tar.gz"), "archive.tar");
        assert_eq!(file_stem("noext"), "noext");
    }

    #[test]
    fn layout_places_artifacts_under_root() {
        let layout = ArtifactLayout::new("/data");
        assert_eq!(
            layout.capture_file("f00", "img.jpg"),
            PathBuf::from("/data/paths/f00/img.jpg")
        );
        assert_eq!(
            layout.depth_map_file("h01"),
            PathBuf::from("/data/hailpads/h01/dmap.png")
        );
        assert_eq!(
            layout.conversion_log("scan1.laz"),
            PathBuf::from("/data/scans/scan1-conversion.log")
        );
        assert_eq!(
            layout.conversion_output_dir("scan1.laz"),
            PathBuf::from("/data/scans/scan1")
        );
    }
}
