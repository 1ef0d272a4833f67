//! Sync engine: walk the source, copy what the ledger has not seen

mod cancel;

pub use cancel::CancelFlag;

use crate::executor::{self, copy_file_atomic, Placement};
use crate::hash::compute_fingerprint;
use crate::ledger::Ledger;
use crate::media;
use crate::metadata::{self, CaptureTime};
use crate::scanner::{DirBatch, ExcludeMatcher, Walk};
use crate::types::{BackupError, FatalReason, SyncOutcome, SyncRecord, SyncReport};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Knobs for a single [`sync`] call.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub exclude: ExcludeMatcher,
    pub cancel: CancelFlag,
}

/// Why a file was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Content is not an image or video
    NotMedia,
    /// Fingerprint already in the ledger
    AlreadySynced,
}

/// Events emitted while syncing.
#[derive(Debug)]
pub enum SyncEvent {
    /// About to process the files of a directory.
    DirectoryStart {
        path: PathBuf,
        relative: PathBuf,
        files: usize,
    },
    /// File copied into the destination.
    FileCopied {
        path: PathBuf,
        dest: PathBuf,
        bytes: u64,
    },
    /// Identical file already at the destination path, recorded without copying.
    FileAdopted { path: PathBuf, dest: PathBuf },
    /// File left alone.
    FileSkipped { path: PathBuf, reason: SkipReason },
    /// All files of the directory were visited.
    DirectoryDone { path: PathBuf },
    /// Run finished (any outcome other than an error).
    Complete { report: SyncReport },
}

/// Optional callback used to receive sync events.
pub type SyncCallback<'a> = dyn Fn(&SyncEvent) + Send + Sync + 'a;

enum FileResult {
    Copied { dest: PathBuf, bytes: u64 },
    Adopted { dest: PathBuf },
    Skipped(SkipReason),
}

/// Back up every new media file under `source` into `dest`
///
/// Directories are processed depth-first, subdirectories before the files
/// of their parent. Each file is classified by content, fingerprinted and
/// looked up in `ledger`; unseen files are copied to
/// `dest/<YYYY-MM>/<name>` and recorded immediately, so work done before an
/// interruption is kept.
///
/// Run-ending conditions come back as `Ok` with a non-completed
/// [`SyncOutcome`]: cancellation, a source that stopped answering, or a
/// destination that refuses writes or is full. Anything else (unexpected IO
/// errors, ledger failures) is returned as `Err`.
pub fn sync(
    source: &Path,
    dest: &Path,
    ledger: &Ledger,
    options: &SyncOptions,
    on_event: Option<&SyncCallback<'_>>,
) -> Result<SyncReport, BackupError> {
    let mut report = SyncReport::default();
    info!(source = %source.display(), dest = %dest.display(), "sync started");

    if let Some(outcome) = run(source, dest, ledger, options, on_event, &mut report)? {
        report.outcome = outcome;
    }

    info!(
        outcome = %report.outcome,
        copied = report.files_copied,
        bytes = report.bytes_copied,
        adopted = report.files_adopted,
        "sync finished"
    );
    emit_event(
        on_event,
        SyncEvent::Complete {
            report: report.clone(),
        },
    );
    Ok(report)
}

/// Drive the walk; `Ok(Some(_))` is an early, non-error stop.
fn run(
    source: &Path,
    dest: &Path,
    ledger: &Ledger,
    options: &SyncOptions,
    on_event: Option<&SyncCallback<'_>>,
    report: &mut SyncReport,
) -> Result<Option<SyncOutcome>, BackupError> {
    let walk = match Walk::new(source, &options.exclude, Some(dest)) {
        Ok(walk) => walk,
        Err(e) => return stop_for(e),
    };

    for batch in walk {
        if options.cancel.is_cancelled() {
            return Ok(Some(SyncOutcome::Stopped));
        }
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => return stop_for(e),
        };
        if let Some(outcome) = sync_directory(&batch, source, dest, ledger, options, on_event, report)? {
            return Ok(Some(outcome));
        }
    }

    Ok(None)
}

fn sync_directory(
    batch: &DirBatch,
    source: &Path,
    dest: &Path,
    ledger: &Ledger,
    options: &SyncOptions,
    on_event: Option<&SyncCallback<'_>>,
    report: &mut SyncReport,
) -> Result<Option<SyncOutcome>, BackupError> {
    if batch.files.is_empty() {
        return Ok(None);
    }
    info!(dir = %batch.path.display(), files = batch.files.len(), "syncing directory");
    emit_event(
        on_event,
        SyncEvent::DirectoryStart {
            path: batch.path.clone(),
            relative: batch.relative.clone(),
            files: batch.files.len(),
        },
    );

    for path in &batch.files {
        if options.cancel.is_cancelled() {
            return Ok(Some(SyncOutcome::Stopped));
        }

        let result = match sync_file(path, source, dest, ledger) {
            Ok(result) => result,
            Err(e) => return stop_for(e),
        };

        let event = match result {
            FileResult::Copied { dest, bytes } => {
                report.files_copied += 1;
                report.bytes_copied += bytes;
                SyncEvent::FileCopied {
                    path: path.clone(),
                    dest,
                    bytes,
                }
            }
            FileResult::Adopted { dest } => {
                report.files_adopted += 1;
                SyncEvent::FileAdopted {
                    path: path.clone(),
                    dest,
                }
            }
            FileResult::Skipped(reason) => SyncEvent::FileSkipped {
                path: path.clone(),
                reason,
            },
        };
        emit_event(on_event, event);
    }

    emit_event(
        on_event,
        SyncEvent::DirectoryDone {
            path: batch.path.clone(),
        },
    );
    Ok(None)
}

fn sync_file(path: &Path, source: &Path, dest: &Path, ledger: &Ledger) -> Result<FileResult, BackupError> {
    let media = match media::classify(path)? {
        Some(media) => media,
        None => {
            debug!(path = %path.display(), "not media, skipping");
            return Ok(FileResult::Skipped(SkipReason::NotMedia));
        }
    };

    let fingerprint = compute_fingerprint(path)?;
    if ledger.exists(&fingerprint)? {
        debug!(path = %path.display(), %fingerprint, "already synced");
        return Ok(FileResult::Skipped(SkipReason::AlreadySynced));
    }

    let captured: CaptureTime = metadata::resolve_with_format(path, media.image_format());
    let file_name = path
        .file_name()
        .ok_or_else(|| BackupError::Validation(format!("No file name in {}", path.display())))?;
    let month_dir = executor::month_dir(dest, &captured);
    let placement = executor::choose_destination(&month_dir, file_name, &fingerprint)?;

    let result = match &placement {
        Placement::Fresh(target) => {
            let bytes = copy_file_atomic(path, target)?;
            debug!(path = %path.display(), dest = %target.display(), bytes, "copied");
            FileResult::Copied {
                dest: target.clone(),
                bytes,
            }
        }
        Placement::Existing(target) => {
            debug!(path = %path.display(), dest = %target.display(), "identical copy already present");
            FileResult::Adopted {
                dest: target.clone(),
            }
        }
    };

    let record = SyncRecord {
        fingerprint,
        source_path: executor::relative_dest(source, path),
        dest_path: executor::relative_dest(dest, placement.path()),
        captured_at: captured.at,
        recorded_at: Local::now().naive_local(),
    };
    if !ledger.insert_if_absent(&record)? {
        debug!(%fingerprint, "ledger already had this fingerprint");
    }

    Ok(result)
}

/// Turn run-ending errors into outcomes; pass everything else through.
fn stop_for(error: BackupError) -> Result<Option<SyncOutcome>, BackupError> {
    let outcome = match error {
        BackupError::PermissionDenied { path } => {
            SyncOutcome::Fatal(FatalReason::PermissionDenied { path })
        }
        BackupError::DiskFull { path } => SyncOutcome::Fatal(FatalReason::DestinationFull { path }),
        BackupError::SourceDisconnected { path } => {
            info!(path = %path.display(), "source disconnected");
            SyncOutcome::Disconnected
        }
        other => return Err(other),
    };
    Ok(Some(outcome))
}

fn emit_event(on_event: Option<&SyncCallback<'_>>, event: SyncEvent) {
    if let Some(callback) = on_event {
        callback(&event);
    }
}
