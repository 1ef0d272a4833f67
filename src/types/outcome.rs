//! Terminal outcome of a sync run

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Why a run ended early without being cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FatalReason {
    /// The destination refused a write
    PermissionDenied { path: PathBuf },

    /// The destination ran out of space
    DestinationFull { path: PathBuf },
}

impl fmt::Display for FatalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalReason::PermissionDenied { path } => {
                write!(f, "permission denied ({})", path.display())
            }
            FatalReason::DestinationFull { path } => {
                write!(f, "not enough space in destination ({})", path.display())
            }
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Every qualifying file was visited
    #[default]
    Completed,

    /// Operator cancelled the run
    Stopped,

    /// Source became unreadable mid-run
    Disconnected,

    /// Destination cannot take more files
    Fatal(FatalReason),
}

impl SyncOutcome {
    /// Process exit code for this outcome.
    pub fn code(&self) -> i32 {
        match self {
            SyncOutcome::Completed => 0,
            SyncOutcome::Stopped => 1,
            SyncOutcome::Disconnected => 2,
            SyncOutcome::Fatal(_) => 3,
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Completed => f.write_str("completed"),
            SyncOutcome::Stopped => f.write_str("stopped"),
            SyncOutcome::Disconnected => f.write_str("disconnected"),
            SyncOutcome::Fatal(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Counters returned from [`crate::engine::sync`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub outcome: SyncOutcome,

    /// Files newly copied into the destination
    pub files_copied: u64,

    /// Bytes newly copied into the destination
    pub bytes_copied: u64,

    /// Files recorded because an identical copy was already in place
    pub files_adopted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_codes() {
        assert_eq!(SyncOutcome::Completed.code(), 0);
        assert_eq!(SyncOutcome::Stopped.code(), 1);
        assert_eq!(SyncOutcome::Disconnected.code(), 2);
        assert_eq!(
            SyncOutcome::Fatal(FatalReason::DestinationFull {
                path: PathBuf::from("/backup")
            })
            .code(),
            3
        );
    }

    #[test]
    fn test_fatal_display_mentions_path() {
        let outcome = SyncOutcome::Fatal(FatalReason::PermissionDenied {
            path: PathBuf::from("/backup/2024-01"),
        });
        let text = outcome.to_string();
        assert!(text.contains("permission denied"));
        assert!(text.contains("/backup/2024-01"));
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_string(&SyncOutcome::Disconnected).expect("serialize outcome");
        assert_eq!(json, r#"{"outcome":"disconnected"}"#);
    }
}
