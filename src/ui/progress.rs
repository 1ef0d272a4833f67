//! Progress reporting

use crate::engine::SyncEvent;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

const LABEL_WIDTH: usize = 18;

/// One bar per source directory, fed from engine events
///
/// Methods take `&self` so the reporter can sit behind the engine's `Fn`
/// callback.
pub struct ProgressReporter {
    enabled: bool,
    current: Mutex<Option<ProgressBar>>,
    started_at: Instant,
    copied_bytes: AtomicU64,
}

impl ProgressReporter {
    /// Create a new progress reporter; a disabled one draws nothing.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            current: Mutex::new(None),
            started_at: Instant::now(),
            copied_bytes: AtomicU64::new(0),
        }
    }

    /// Route an engine event to the matching bar update.
    pub fn handle(&self, event: &SyncEvent) {
        match event {
            SyncEvent::DirectoryStart { path, files, .. } => {
                self.start_directory(&dir_label(path), *files as u64)
            }
            SyncEvent::FileCopied { bytes, .. } => self.advance(*bytes),
            SyncEvent::FileAdopted { .. } | SyncEvent::FileSkipped { .. } => self.advance(0),
            SyncEvent::DirectoryDone { .. } => self.finish_directory(),
            SyncEvent::Complete { .. } => self.abandon(),
        }
    }

    /// Replace the current bar with a fresh one for `label`.
    pub fn start_directory(&self, label: &str, files: u64) {
        let bar = if self.enabled {
            ProgressBar::new(files)
        } else {
            ProgressBar::hidden()
        };
        bar.set_length(files);
        if let Ok(style) =
            ProgressStyle::with_template("syncing : {prefix} | {bar:30.cyan/blue} [{pos}/{len}] {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_prefix(format!("{:<width$}", truncate(label), width = LABEL_WIDTH));

        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(bar) {
                previous.finish();
            }
        }
    }

    /// One file visited; `bytes` is what it added to the destination.
    pub fn advance(&self, bytes: u64) {
        let total = self.copied_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let throughput = self.current_throughput_bps();
        self.with_bar(|bar| {
            bar.inc(1);
            bar.set_message(format!("{} | {}/s", HumanBytes(total), HumanBytes(throughput)));
        });
    }

    /// Leave the finished bar on screen.
    pub fn finish_directory(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(bar) = current.take() {
                bar.finish();
            }
        }
    }

    /// Stop drawing, keeping whatever the bar showed last.
    pub fn abandon(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(bar) = current.take() {
                bar.abandon();
            }
        }
    }

    pub fn copied_bytes(&self) -> u64 {
        self.copied_bytes.load(Ordering::Relaxed)
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(current) = self.current.lock() {
            if let Some(bar) = current.as_ref() {
                f(bar);
            }
        }
    }

    fn current_throughput_bps(&self) -> u64 {
        let secs = self.started_at.elapsed().as_secs_f64();
        if secs > 0.0 {
            (self.copied_bytes() as f64 / secs) as u64
        } else {
            0
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true)
    }
}

fn dir_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn truncate(label: &str) -> String {
    if label.chars().count() <= LABEL_WIDTH {
        return label.to_string();
    }
    let head: String = label.chars().take(LABEL_WIDTH - 1).collect();
    format!("{}…", head)
}
