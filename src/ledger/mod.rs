//! Persistent sync and run ledger
//!
//! One SQLite database per destination root at `<dest>/.shoebox/db`, holding
//! two tables:
//!
//! - `sync`: one row per backed-up file, keyed by content fingerprint.
//!   Append-only; rows are never updated or deleted.
//! - `run`: one row per invocation, written once at the end of the run.
//!
//! WAL journaling lets other processes open the database read-only while a
//! run is writing. Every insert is its own autocommit transaction, so an
//! interrupted run loses at most the file it was working on.

use crate::hash::Fingerprint;
use crate::types::{BackupError, RunRecord, SyncRecord};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory under the destination root that holds shoebox state.
pub const STATE_DIR: &str = ".shoebox";

/// Database file name inside [`STATE_DIR`].
pub const DB_FILE: &str = "db";

/// Text form of timestamps in both tables.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sync (
    fingerprint TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    dest TEXT NOT NULL,
    timestamp TIMESTAMP NOT NULL,
    inserted_at TIMESTAMP NOT NULL
);
CREATE TABLE IF NOT EXISTS run (
    id TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    dest TEXT NOT NULL,
    start TIMESTAMP NOT NULL,
    end TIMESTAMP NOT NULL,
    elapsed_time TEXT NOT NULL,
    dest_size TEXT NOT NULL,
    dest_size_increment TEXT NOT NULL,
    new_sync INTEGER NOT NULL,
    outcome INTEGER
);
"#;

/// State directory for a destination root.
pub fn state_dir(dest_root: &Path) -> PathBuf {
    dest_root.join(STATE_DIR)
}

/// Database path for a destination root.
pub fn db_path(dest_root: &Path) -> PathBuf {
    state_dir(dest_root).join(DB_FILE)
}

/// Handle on the ledger database.
pub struct Ledger {
    conn: Connection,
}

impl Ledger {
    /// Open (creating on first use) the ledger for `dest_root`.
    pub fn open(dest_root: &Path) -> Result<Self, BackupError> {
        let dir = state_dir(dest_root);
        fs::create_dir_all(&dir).map_err(|e| crate::types::map_dest_error(&dir, e))?;

        let path = db_path(dest_root);
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::initialize_connection(&conn)?;
        debug!(path = %path.display(), "ledger opened");

        Ok(Self { conn })
    }

    /// Open an existing ledger without write access, for inspection while a
    /// run may be in progress.
    pub fn open_read_only(dest_root: &Path) -> Result<Self, BackupError> {
        let path = db_path(dest_root);
        if !path.exists() {
            return Err(BackupError::Validation(format!(
                "No ledger found at {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// In-memory ledger for tests.
    pub fn in_memory() -> Result<Self, BackupError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn)?;
        Ok(Self { conn })
    }

    fn initialize_connection(conn: &Connection) -> Result<(), BackupError> {
        // journal_mode returns a row, so it can't go through execute_batch.
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous = FULL;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Has a file with this fingerprint been backed up before?
    pub fn exists(&self, fingerprint: &Fingerprint) -> Result<bool, BackupError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sync WHERE fingerprint = ?1",
                params![fingerprint.to_hex()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert `record` unless its fingerprint is already present.
    ///
    /// Returns `true` when a row was written. The row is committed before
    /// this returns.
    pub fn insert_if_absent(&self, record: &SyncRecord) -> Result<bool, BackupError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO sync (fingerprint, source, dest, timestamp, inserted_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.fingerprint.to_hex(),
                record.source_path,
                record.dest_path,
                format_timestamp(&record.captured_at),
                format_timestamp(&record.recorded_at),
            ],
        )?;
        Ok(inserted == 1)
    }

    /// Look up the record for a fingerprint.
    pub fn get(&self, fingerprint: &Fingerprint) -> Result<Option<SyncRecord>, BackupError> {
        let row = self
            .conn
            .query_row(
                "SELECT fingerprint, source, dest, timestamp, inserted_at
                 FROM sync WHERE fingerprint = ?1",
                params![fingerprint.to_hex()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(fp, source_path, dest_path, captured_at, recorded_at)| {
            Ok(SyncRecord {
                fingerprint: fp.parse()?,
                source_path,
                dest_path,
                captured_at: parse_timestamp(&captured_at)?,
                recorded_at: parse_timestamp(&recorded_at)?,
            })
        })
        .transpose()
    }

    /// Number of files ever backed up into this destination.
    pub fn count_synced(&self) -> Result<u64, BackupError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Append the record of a finished run.
    pub fn record_run(&self, run: &RunRecord) -> Result<(), BackupError> {
        self.conn.execute(
            "INSERT INTO run (id, source, dest, start, end, elapsed_time, dest_size,
                              dest_size_increment, new_sync, outcome)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run.id,
                run.source,
                run.dest,
                format_timestamp(&run.start),
                format_timestamp(&run.end),
                run.elapsed_time,
                run.dest_size,
                run.dest_size_increment,
                run.new_sync as i64,
                run.outcome,
            ],
        )?;
        Ok(())
    }

    /// Most recent runs, newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, BackupError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source, dest, start, end, elapsed_time, dest_size,
                    dest_size_increment, new_sync, outcome
             FROM run ORDER BY start DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, i64>(8)?,
                row.get::<_, Option<i32>>(9)?,
            ))
        })?;

        let mut runs = Vec::new();
        for row in rows {
            let (id, source, dest, start, end, elapsed_time, dest_size, increment, new_sync, outcome) =
                row?;
            runs.push(RunRecord {
                id,
                source,
                dest,
                start: parse_timestamp(&start)?,
                end: parse_timestamp(&end)?,
                elapsed_time,
                dest_size,
                dest_size_increment: increment,
                new_sync: new_sync.max(0) as u64,
                outcome: outcome.unwrap_or_default(),
            });
        }
        Ok(runs)
    }
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Accepts both `2024-01-02 03:04:05.000000` and the fraction-less form.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, BackupError> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| BackupError::Validation(format!("Bad timestamp '{}' in ledger: {}", text, e)))
}
