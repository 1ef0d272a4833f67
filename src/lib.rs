//! # shoebox - incremental photo and video backup
//!
//! Copies new media from a source tree (typically a mounted phone) into a
//! destination organized as `YYYY-MM/<name>`, using embedded capture dates
//! when available. Every copied file is recorded by content fingerprint in a
//! SQLite ledger inside the destination, so later runs skip it even after
//! renames or re-mounts.

// Module declarations
pub mod commands;
pub mod config;
pub mod engine;
pub mod executor;
pub mod hash;
pub mod ledger;
pub mod logging;
pub mod media;
pub mod metadata;
pub mod scanner;
pub mod types;
pub mod ui;

// Re-export commonly used types
pub use config::Config;
pub use engine::{sync, CancelFlag, SyncEvent, SyncOptions};
pub use hash::Fingerprint;
pub use ledger::Ledger;
pub use types::{BackupError, FatalReason, RunRecord, SyncOutcome, SyncRecord, SyncReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
