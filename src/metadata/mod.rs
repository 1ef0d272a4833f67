//! Capture timestamp resolution
//!
//! Embedded metadata wins when it can be read; anything else falls back to
//! the file's modification time. Resolution never fails.

mod heif;
mod jpeg;
mod png;
mod tiff;

use crate::media::{self, ImageFormat};
use crate::types::BackupError;
use chrono::{DateTime, Local, NaiveDateTime};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub use tiff::{parse_exif_datetime, EXIF_DATETIME_FORMAT};

/// Where a resolved timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    Embedded,
    Modified,
    Now,
}

/// Resolved capture time for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTime {
    pub at: NaiveDateTime,
    pub source: TimestampSource,
}

impl CaptureTime {
    /// Destination month folder, `YYYY-MM`.
    pub fn month_folder(&self) -> String {
        self.at.format("%Y-%m").to_string()
    }
}

/// Resolve the capture time of `path`, sniffing its format first.
pub fn resolve_capture_time(path: &Path) -> CaptureTime {
    let format = match media::classify(path) {
        Ok(Some(media)) => media.image_format(),
        _ => None,
    };
    resolve_with_format(path, format)
}

/// Resolve the capture time of `path` when the caller already knows its format.
pub fn resolve_with_format(path: &Path, format: Option<ImageFormat>) -> CaptureTime {
    if let Some(format) = format {
        match extract_embedded(path, format) {
            Ok(Some(at)) => {
                return CaptureTime {
                    at,
                    source: TimestampSource::Embedded,
                }
            }
            Ok(None) => {
                debug!(path = %path.display(), ?format, "no embedded capture time");
            }
            Err(e) => {
                debug!(path = %path.display(), ?format, error = %e, "embedded metadata unreadable");
            }
        }
    }
    filesystem_time(path)
}

/// Run the extractor dedicated to `format`.
pub fn extract_embedded(path: &Path, format: ImageFormat) -> Result<Option<NaiveDateTime>, BackupError> {
    match format {
        ImageFormat::Jpeg => jpeg::capture_time(path),
        ImageFormat::Png => png::capture_time(path),
        ImageFormat::Heif => heif::capture_time(path),
    }
}

fn filesystem_time(path: &Path) -> CaptureTime {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(mtime) => CaptureTime {
            at: DateTime::<Local>::from(mtime).naive_local(),
            source: TimestampSource::Modified,
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "no modification time, using current time");
            CaptureTime {
                at: Local::now().naive_local(),
                source: TimestampSource::Now,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn set_mtime_local(path: &Path, at: NaiveDateTime) {
        let local = Local
            .from_local_datetime(&at)
            .single()
            .expect("unambiguous local time");
        let system: SystemTime = local.into();
        filetime::set_file_mtime(path, filetime::FileTime::from_system_time(system))
            .expect("set mtime");
    }

    fn noon(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid date")
    }

    #[test]
    fn test_png_without_exif_falls_back_to_mtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("screenshot.png");
        fs::write(&path, b"\x89PNG\r\n\x1a\n\0\0\0\0IEND\0\0\0\0").unwrap();
        set_mtime_local(&path, noon(2019, 3, 9));

        let resolved = resolve_capture_time(&path);
        assert_eq!(resolved.source, TimestampSource::Modified);
        assert_eq!(resolved.at, noon(2019, 3, 9));
        assert_eq!(resolved.month_folder(), "2019-03");
    }

    #[test]
    fn test_corrupt_jpeg_falls_back_to_mtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE1, 0xFF, 0xFF, b'E', b'x']).unwrap();
        set_mtime_local(&path, noon(2020, 11, 1));

        let resolved = resolve_with_format(&path, Some(ImageFormat::Jpeg));
        assert_eq!(resolved.source, TimestampSource::Modified);
        assert_eq!(resolved.month_folder(), "2020-11");
    }

    #[test]
    fn test_unknown_format_uses_mtime_directly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        fs::write(&path, b"whatever").unwrap();
        set_mtime_local(&path, noon(2018, 8, 8));

        let resolved = resolve_with_format(&path, None);
        assert_eq!(resolved.at, noon(2018, 8, 8));
    }

    #[test]
    fn test_embedded_png_time_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("img1.png");
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&19u32.to_be_bytes());
        bytes.extend_from_slice(b"eXIf2024:01:02 03:04:05\0\0\0\0");
        fs::write(&path, &bytes).unwrap();
        set_mtime_local(&path, noon(2019, 3, 9));

        let resolved = resolve_with_format(&path, Some(ImageFormat::Png));
        assert_eq!(resolved.source, TimestampSource::Embedded);
        assert_eq!(resolved.at.to_string(), "2024-01-02 03:04:05");
        assert_eq!(resolved.month_folder(), "2024-01");
    }

    #[test]
    fn test_missing_file_uses_now() {
        let resolved = resolve_with_format(Path::new("/nonexistent/a.png"), Some(ImageFormat::Png));
        assert_eq!(resolved.source, TimestampSource::Now);
    }
}
