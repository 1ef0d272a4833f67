//! Single-run lock on a destination

use crate::ledger;
use crate::types::{map_dest_error, BackupError};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const LOCK_FILE: &str = "shoebox.lock";

/// Exclusive claim on `<dest>/.shoebox/shoebox.lock`, released on drop
///
/// A crashed run leaves the file behind; it must then be removed by hand.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(dest_root: &Path) -> Result<Self, BackupError> {
        let state = ledger::state_dir(dest_root);
        fs::create_dir_all(&state).map_err(|e| map_dest_error(&state, e))?;

        let path = state.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(BackupError::Locked { path });
            }
            Err(e) => return Err(map_dest_error(&path, e)),
        };
        // Best effort; the file's existence is the lock.
        let _ = writeln!(file, "{}", std::process::id());

        debug!(path = %path.display(), "lock acquired");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}
