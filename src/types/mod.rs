//! Core type definitions for shoebox

mod error;
mod outcome;
mod record;

pub use error::{map_dest_error, map_source_error, BackupError};
pub use outcome::{FatalReason, SyncOutcome, SyncReport};
pub use record::{RunRecord, SyncRecord};
