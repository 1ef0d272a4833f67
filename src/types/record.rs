//! Rows persisted in the ledger

use crate::hash::Fingerprint;
use chrono::NaiveDateTime;
use serde::Serialize;

/// One backed-up file. Append-only: never updated once inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncRecord {
    /// Content hash, primary key
    pub fingerprint: Fingerprint,

    /// Source-relative path at time of copy (informational)
    pub source_path: String,

    /// Destination-relative path (`YYYY-MM/<name>`)
    pub dest_path: String,

    /// Resolved capture timestamp
    pub captured_at: NaiveDateTime,

    /// Wall-clock time the row was written
    pub recorded_at: NaiveDateTime,
}

/// One invocation of the backup command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub id: String,
    pub source: String,
    pub dest: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,

    /// `"<m> min <s> sec"`
    pub elapsed_time: String,

    /// Human-readable destination size after the run
    pub dest_size: String,

    /// Human-readable bytes added by the run
    pub dest_size_increment: String,

    pub new_sync: u64,

    /// Exit code of the run, see [`crate::SyncOutcome::code`]
    pub outcome: i32,
}
