//! Executor module: placing files in the destination tree

pub mod copy;

use crate::hash::{fingerprint_with, Fingerprint};
use crate::metadata::CaptureTime;
use crate::types::{map_dest_error, BackupError};
use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub use copy::copy_file_atomic;

/// Where a new file should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Free path, copy the file there
    Fresh(PathBuf),

    /// Identical bytes already sit at this path; nothing to copy
    Existing(PathBuf),
}

impl Placement {
    pub fn path(&self) -> &Path {
        match self {
            Placement::Fresh(p) | Placement::Existing(p) => p,
        }
    }
}

/// Month folder for a capture time, `<dest_root>/YYYY-MM`.
pub fn month_dir(dest_root: &Path, captured: &CaptureTime) -> PathBuf {
    dest_root.join(captured.month_folder())
}

/// Pick the destination path for a file named `file_name` inside `dir`
///
/// The original name is used when free. A path that already holds the same
/// content (by fingerprint) is returned as [`Placement::Existing`]. A path
/// holding different content is never overwritten: `<stem>_1.<ext>`,
/// `<stem>_2.<ext>`, ... are tried in turn.
pub fn choose_destination(
    dir: &Path,
    file_name: &OsStr,
    fingerprint: &Fingerprint,
) -> Result<Placement, BackupError> {
    for attempt in 0u32.. {
        let candidate = dir.join(candidate_name(file_name, attempt));
        match fs::symlink_metadata(&candidate) {
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Placement::Fresh(candidate)),
            Err(e) => return Err(map_dest_error(&candidate, e)),
            Ok(meta) if meta.is_file() => {
                if fingerprint_with(&candidate, map_dest_error)? == *fingerprint {
                    return Ok(Placement::Existing(candidate));
                }
            }
            Ok(_) => {}
        }
    }
    unreachable!("u32 candidate space exhausted")
}

/// `IMG_0001.HEIC` → `IMG_0001_2.HEIC` for attempt 2.
fn candidate_name(file_name: &OsStr, attempt: u32) -> String {
    let name = file_name.to_string_lossy();
    if attempt == 0 {
        return name.into_owned();
    }
    let path = Path::new(&*name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, attempt, ext.to_string_lossy()),
        None => format!("{}_{}", stem, attempt),
    }
}

/// Destination path relative to the root, always `/`-separated.
pub fn relative_dest(dest_root: &Path, dest: &Path) -> String {
    let rel = dest.strip_prefix(dest_root).unwrap_or(dest);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::compute_fingerprint;
    use tempfile::TempDir;

    fn fingerprint_of(dir: &Path, content: &[u8]) -> Fingerprint {
        let probe = dir.join("probe.bin");
        fs::write(&probe, content).unwrap();
        let fp = compute_fingerprint(&probe).unwrap();
        fs::remove_file(probe).unwrap();
        fp
    }

    #[test]
    fn test_candidate_names() {
        assert_eq!(candidate_name(OsStr::new("IMG_0001.HEIC"), 0), "IMG_0001.HEIC");
        assert_eq!(candidate_name(OsStr::new("IMG_0001.HEIC"), 2), "IMG_0001_2.HEIC");
        assert_eq!(candidate_name(OsStr::new("clip.tar.mov"), 1), "clip.tar_1.mov");
        assert_eq!(candidate_name(OsStr::new("README"), 1), "README_1");
        assert_eq!(candidate_name(OsStr::new(".hidden"), 1), ".hidden_1");
    }

    #[test]
    fn test_free_path_is_fresh() {
        let root = TempDir::new().unwrap();
        let fp = fingerprint_of(root.path(), b"a");

        let placement = choose_destination(root.path(), OsStr::new("a.jpg"), &fp).unwrap();
        assert_eq!(placement, Placement::Fresh(root.path().join("a.jpg")));
    }

    #[test]
    fn test_identical_existing_file_is_adopted() {
        let root = TempDir::new().unwrap();
        let fp = fingerprint_of(root.path(), b"same bytes");
        fs::write(root.path().join("a.jpg"), b"same bytes").unwrap();

        let placement = choose_destination(root.path(), OsStr::new("a.jpg"), &fp).unwrap();
        assert_eq!(placement, Placement::Existing(root.path().join("a.jpg")));
    }

    #[test]
    fn test_different_existing_file_gets_suffix() {
        let root = TempDir::new().unwrap();
        let fp = fingerprint_of(root.path(), b"new photo");
        fs::write(root.path().join("a.jpg"), b"other photo").unwrap();
        fs::write(root.path().join("a_1.jpg"), b"yet another").unwrap();

        let placement = choose_destination(root.path(), OsStr::new("a.jpg"), &fp).unwrap();
        assert_eq!(placement, Placement::Fresh(root.path().join("a_2.jpg")));
    }

    #[test]
    fn test_directory_in_the_way_is_skipped() {
        let root = TempDir::new().unwrap();
        let fp = fingerprint_of(root.path(), b"x");
        fs::create_dir(root.path().join("a.jpg")).unwrap();

        let placement = choose_destination(root.path(), OsStr::new("a.jpg"), &fp).unwrap();
        assert_eq!(placement.path(), root.path().join("a_1.jpg"));
    }

    #[test]
    fn test_relative_dest_uses_forward_slashes() {
        let root = Path::new("/backup");
        assert_eq!(
            relative_dest(root, &root.join("2024-01").join("img1.png")),
            "2024-01/img1.png"
        );
    }
}
