//! Media classification by content signature
//!
//! Extensions are never trusted: a file qualifies only when its leading bytes
//! identify an image or video container. Device sidecars (`.AAE` plists,
//! thumbnails databases, ...) are rejected whatever they are named.

use crate::types::{map_source_error, BackupError};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Broad media category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// Image container formats with a dedicated timestamp extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Heif,
}

impl ImageFormat {
    /// Map a detected MIME type to an extractor, if one exists.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            "image/heif" | "image/heic" | "image/avif" => Some(ImageFormat::Heif),
            _ => None,
        }
    }
}

/// Result of a successful classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaType {
    pub kind: MediaKind,
    pub mime: &'static str,
}

impl MediaType {
    pub fn image_format(&self) -> Option<ImageFormat> {
        match self.kind {
            MediaKind::Image => ImageFormat::from_mime(self.mime),
            MediaKind::Video => None,
        }
    }
}

/// Classify a filesystem entry by its content signature
///
/// Returns `Ok(None)` for anything that is not a readable regular file holding
/// image or video content: directories, broken symlinks, special files,
/// unreadable files and non-media content. The only error surfaced is a source
/// disconnect, so the engine can end the run instead of silently skipping
/// every remaining file.
pub fn classify(path: &Path) -> Result<Option<MediaType>, BackupError> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => return reject_unreadable(path, e),
    };
    if !metadata.is_file() {
        return Ok(None);
    }

    let detected = match infer::get_from_path(path) {
        Ok(t) => t,
        Err(e) => return reject_unreadable(path, e),
    };

    let media = detected.and_then(|t| {
        let kind = match t.matcher_type() {
            infer::MatcherType::Image => MediaKind::Image,
            infer::MatcherType::Video => MediaKind::Video,
            _ => return None,
        };
        Some(MediaType {
            kind,
            mime: t.mime_type(),
        })
    });

    if media.is_none() {
        debug!(path = %path.display(), "not a media file, skipping");
    }
    Ok(media)
}

/// Convenience predicate over [`classify`].
pub fn is_media(path: &Path) -> bool {
    matches!(classify(path), Ok(Some(_)))
}

fn reject_unreadable(path: &Path, error: std::io::Error) -> Result<Option<MediaType>, BackupError> {
    let err = map_source_error(path, error);
    if err.is_disconnect() {
        return Err(err);
    }
    debug!(path = %path.display(), error = %err, "unreadable entry, skipping");
    Ok(None)
}
