//! Atomic file copy implementation

use crate::types::{map_dest_error, map_source_error, BackupError};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

const COPY_BUFFER: usize = 128 * 1024;

/// Copy a file atomically using the write-then-rename strategy
///
/// 1. Stream into a hidden `.part` temp file next to `dest`
/// 2. Flush and sync to disk
/// 3. Preserve metadata (permissions, mtime)
/// 4. Rename onto `dest`
///
/// Because the temp file lives in the destination directory the final rename
/// never crosses a filesystem. If any step fails the temp file is removed and
/// `dest` is left untouched, so a reader never sees a partial copy.
///
/// Read errors are classified against `src` and write errors against `dest`,
/// which lets the caller tell a vanished device from a full disk.
///
/// # Returns
/// * `Ok(u64)` - Number of bytes copied
///
/// # Example
/// ```no_run
/// use shoebox::executor::copy_file_atomic;
/// use std::path::Path;
///
/// let bytes = copy_file_atomic(
///     Path::new("/mnt/phone/DCIM/100APPLE/IMG_0001.HEIC"),
///     Path::new("/backup/2024-01/IMG_0001.HEIC"),
/// )?;
/// # Ok::<(), shoebox::BackupError>(())
/// ```
pub fn copy_file_atomic(src: &Path, dest: &Path) -> Result<u64, BackupError> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| map_dest_error(parent, e))?;

    let file_name = dest
        .file_name()
        .ok_or_else(|| BackupError::Validation(format!("No file name in {}", dest.display())))?;

    let mut src_file = File::open(src).map_err(|e| map_source_error(src, e))?;
    let src_metadata = src_file.metadata().map_err(|e| map_source_error(src, e))?;

    // Dropped (and deleted) on every early return below.
    let mut part = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name.to_string_lossy()))
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(|e| map_dest_error(parent, e))?;

    let mut buffer = vec![0u8; COPY_BUFFER];
    let mut total_bytes = 0u64;
    loop {
        let bytes_read = src_file
            .read(&mut buffer)
            .map_err(|e| map_source_error(src, e))?;
        if bytes_read == 0 {
            break;
        }
        part.write_all(&buffer[..bytes_read])
            .map_err(|e| map_dest_error(dest, e))?;
        total_bytes += bytes_read as u64;
    }

    part.as_file()
        .sync_all()
        .map_err(|e| map_dest_error(dest, e))?;

    fs::set_permissions(part.path(), src_metadata.permissions())
        .map_err(|e| map_dest_error(dest, e))?;
    let mtime = src_metadata.modified().map_err(|e| map_source_error(src, e))?;
    filetime::set_file_mtime(part.path(), filetime::FileTime::from_system_time(mtime))
        .map_err(|e| map_dest_error(dest, e))?;

    part.persist(dest).map_err(|e| map_dest_error(dest, e.error))?;

    Ok(total_bytes)
}
