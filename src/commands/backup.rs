//! Backup command

use super::lock::RunLock;
use crate::engine::{self, CancelFlag, SyncEvent, SyncOptions};
use crate::ledger::Ledger;
use crate::types::{BackupError, RunRecord, SyncOutcome, SyncReport};
use crate::ui::{format_elapsed, human_size, ProgressReporter};
use crate::Config;
use chrono::Local;
use console::style;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct BackupSummary<'a> {
    run: &'a RunRecord,
    report: &'a SyncReport,
}

/// Run one backup and return the process exit code
///
/// The destination is locked for the duration of the run. Whatever the
/// engine outcome, one run record is appended to the ledger before
/// returning. Errors that are not run outcomes (ledger failures, unexpected
/// IO) are returned without writing a run record.
pub fn run(config: &Config, cancel: &CancelFlag) -> Result<i32, BackupError> {
    let _lock = RunLock::acquire(&config.destination)?;
    let ledger = Ledger::open(&config.destination)?;

    if !config.json {
        println!("{} starting a new backup", tag());
        println!("source  : {}", config.source.display());
        println!("dest    : {}", config.destination.display());
    }

    let started_at = Instant::now();
    let start = Local::now().naive_local();

    let reporter = ProgressReporter::new(config.progress && !config.json);
    let on_event = |event: &SyncEvent| reporter.handle(event);
    let options = SyncOptions {
        exclude: config.exclude_matcher()?,
        cancel: cancel.clone(),
    };

    let report = match engine::sync(
        &config.source,
        &config.destination,
        &ledger,
        &options,
        Some(&on_event),
    ) {
        Ok(report) => report,
        Err(e) => {
            reporter.abandon();
            return Err(e);
        }
    };

    if !config.json {
        println!("{} calculating space usage...", tag());
    }
    let dest_size = dir_size(&config.destination);
    let elapsed = started_at.elapsed();

    let run = RunRecord {
        id: Uuid::new_v4().to_string(),
        source: config.source.display().to_string(),
        dest: config.destination.display().to_string(),
        start,
        end: Local::now().naive_local(),
        elapsed_time: format_elapsed(elapsed),
        dest_size: human_size(dest_size),
        dest_size_increment: human_size(report.bytes_copied),
        new_sync: report.files_copied,
        outcome: report.outcome.code(),
    };
    ledger.record_run(&run)?;
    info!(id = %run.id, outcome = run.outcome, "run recorded");

    if config.json {
        let summary = BackupSummary {
            run: &run,
            report: &report,
        };
        let text = serde_json::to_string_pretty(&summary)
            .map_err(|e| BackupError::Validation(format!("Cannot encode run summary: {}", e)))?;
        println!("{}", text);
    } else {
        println!("{}", format_summary(&report, &run));
    }

    Ok(report.outcome.code())
}

fn tag() -> console::StyledObject<&'static str> {
    style("[shoebox]").bold()
}

/// Summary block printed after a run.
fn format_summary(report: &SyncReport, run: &RunRecord) -> String {
    let headline = match &report.outcome {
        SyncOutcome::Completed => style("backup completed".to_string()).green(),
        SyncOutcome::Stopped => style("backup stopped".to_string()).yellow(),
        SyncOutcome::Disconnected => {
            style("backup interrupted: source disconnected, did you remove the device?".to_string())
                .red()
        }
        SyncOutcome::Fatal(reason) => style(format!("backup failed: {}", reason)).red(),
    };

    let mut lines = vec![
        format!("{} {}", tag(), headline),
        format!("new backups       : {} ({})", run.new_sync, run.dest_size_increment),
    ];
    if report.files_adopted > 0 {
        lines.push(format!("already in place  : {}", report.files_adopted));
    }
    lines.push(format!("total space usage : {}", run.dest_size));
    lines.push(format!("elapsed time      : {}", run.elapsed_time));
    lines.join("\n")
}

/// Total size of regular files under `root`; symlinks are not followed.
pub fn dir_size(root: &Path) -> u64 {
    let mut total = 0u64;
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "cannot size directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            match entry.metadata() {
                Ok(meta) if meta.is_dir() => stack.push(entry.path()),
                Ok(meta) if meta.is_file() => total += meta.len(),
                Ok(_) => {}
                Err(e) => warn!(path = %entry.path().display(), error = %e, "cannot stat"),
            }
        }
    }

    total
}
