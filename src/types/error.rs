//! Error types for shoebox

use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for shoebox operations
#[derive(Debug, Error)]
pub enum BackupError {
    /// Standard IO error (automatically converted via #[from])
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error (logic checks)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Permission denied for specific path
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Destination filesystem is out of space
    #[error("Disk full while writing {path}")]
    DiskFull { path: PathBuf },

    /// Source stopped answering reads (device unplugged, FUSE mount gone)
    #[error("Source disconnected while reading {path}")]
    SourceDisconnected { path: PathBuf },

    /// Ledger database failure
    #[error("Ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),

    /// Embedded metadata could not be decoded
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Another run holds the destination lock
    #[error("Destination is locked by another run: {path}")]
    Locked { path: PathBuf },
}

impl BackupError {
    /// Check if this error is a validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(self, BackupError::Validation(_) | BackupError::Config(_))
    }

    /// Check if this error is related to permissions
    pub fn is_permission_error(&self) -> bool {
        matches!(self, BackupError::PermissionDenied { .. })
    }

    /// Check if this error is related to disk space
    pub fn is_disk_space_error(&self) -> bool {
        matches!(self, BackupError::DiskFull { .. })
    }

    /// Check if the source went away underneath the run
    pub fn is_disconnect(&self) -> bool {
        matches!(self, BackupError::SourceDisconnected { .. })
    }
}

// errno values a vanished device or dead FUSE mount surfaces as:
// EIO, ENXIO, ENODEV, ENOTCONN.
const DISCONNECT_ERRNOS: [i32; 4] = [5, 6, 19, 107];

// ENOSPC, EDQUOT.
const DISK_FULL_ERRNOS: [i32; 2] = [28, 122];

/// Classify an IO error raised while reading from the source tree.
pub fn map_source_error(path: &Path, error: IoError) -> BackupError {
    if matches!(error.raw_os_error(), Some(code) if DISCONNECT_ERRNOS.contains(&code)) {
        BackupError::SourceDisconnected {
            path: path.to_path_buf(),
        }
    } else {
        BackupError::Io(error)
    }
}

/// Classify an IO error raised while writing into the destination tree.
pub fn map_dest_error(path: &Path, error: IoError) -> BackupError {
    if matches!(error.kind(), ErrorKind::PermissionDenied) {
        BackupError::PermissionDenied {
            path: path.to_path_buf(),
        }
    } else if matches!(error.kind(), ErrorKind::StorageFull)
        || matches!(error.raw_os_error(), Some(code) if DISK_FULL_ERRNOS.contains(&code))
    {
        BackupError::DiskFull {
            path: path.to_path_buf(),
        }
    } else {
        BackupError::Io(error)
    }
}
