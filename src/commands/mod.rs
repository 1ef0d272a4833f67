//! Command implementations

pub mod backup;
pub mod history;
pub mod lock;

use crate::types::BackupError;
use std::io::ErrorKind;

pub use lock::RunLock;

/// Plain-English message plus an optional hint for an error that ended the program.
pub fn humanize_error(error: &BackupError) -> (String, Option<String>) {
    match error {
        BackupError::Io(io) => match io.kind() {
            ErrorKind::NotFound => (
                "File or directory was not found".to_string(),
                Some("Verify the path still exists and retry.".to_string()),
            ),
            ErrorKind::PermissionDenied => (
                "Permission denied while reading the source".to_string(),
                Some("Check file permissions or run with a user that has access.".to_string()),
            ),
            _ => (
                format!("I/O operation failed: {}", io),
                Some("Retry the backup. Already copied files will be skipped.".to_string()),
            ),
        },
        BackupError::PermissionDenied { path } => (
            format!("Permission denied writing {}", path.display()),
            Some("Check destination permissions.".to_string()),
        ),
        BackupError::DiskFull { path } => (
            format!("Not enough space in destination ({})", path.display()),
            Some("Free disk space on the destination and retry.".to_string()),
        ),
        BackupError::SourceDisconnected { path } => (
            format!("Source stopped responding while reading {}", path.display()),
            Some("Did you remove the device? Reconnect it and retry.".to_string()),
        ),
        BackupError::Ledger(e) => (
            format!("Backup ledger failed: {}", e),
            Some("Check that the destination is writable and not shared with another run.".to_string()),
        ),
        BackupError::Locked { path } => (
            "Another backup is already running on this destination".to_string(),
            Some(format!(
                "If no other run is active, remove {} and retry.",
                path.display()
            )),
        ),
        BackupError::Config(msg) | BackupError::Validation(msg) | BackupError::Metadata(msg) => {
            (msg.clone(), None)
        }
    }
}

/// One or two lines ready for stderr.
pub fn format_error(error: &BackupError) -> String {
    let (message, suggestion) = humanize_error(error);
    match suggestion {
        Some(suggestion) => format!("error: {}\n  Try: {}", message, suggestion),
        None => format!("error: {}", message),
    }
}
