//! Depth-first source walker

use super::ExcludeMatcher;
use crate::types::{map_source_error, BackupError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Files of one directory, handed out once all of its subdirectories are done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirBatch {
    /// Absolute (as given) path of the directory
    pub path: PathBuf,

    /// Path relative to the walk root; empty for the root itself
    pub relative: PathBuf,

    /// Non-directory entries, sorted by name
    pub files: Vec<PathBuf>,
}

struct Frame {
    dir: PathBuf,
    /// Subdirectories still to visit, sorted descending so `pop` yields them in order
    pending: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

/// Post-order directory iterator driven by an explicit stack
///
/// For every directory, all subdirectories (in lexicographic order, each
/// fully) are yielded before the directory's own files. Directory symlinks
/// are listed as neither directories nor files. `skip` names a directory
/// that is never entered, typically the backup destination when it lives
/// inside the source tree.
///
/// Read errors on the root are returned from [`Walk::new`]. A subdirectory
/// that cannot be read makes the iterator yield the error and then end.
pub struct Walk<'a> {
    root: PathBuf,
    exclude: &'a ExcludeMatcher,
    skip: Option<PathBuf>,
    stack: Vec<Frame>,
}

impl<'a> Walk<'a> {
    pub fn new(
        root: &Path,
        exclude: &'a ExcludeMatcher,
        skip: Option<&Path>,
    ) -> Result<Self, BackupError> {
        let skip = skip.and_then(|dir| inside_root(root, dir));
        let mut walk = Self {
            root: root.to_path_buf(),
            exclude,
            skip,
            stack: Vec::new(),
        };
        let frame = walk
            .read_frame(root)
            .map_err(|e| map_source_error(root, e))?;
        walk.stack.push(frame);
        Ok(walk)
    }

    fn read_frame(&self, dir: &Path) -> std::io::Result<Frame> {
        let mut pending = Vec::new();
        let mut files = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(&path);

            if self.exclude.is_excluded(relative) {
                debug!(path = %path.display(), "excluded");
                continue;
            }

            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                if self.is_skipped(&path) {
                    debug!(path = %path.display(), "not descending into destination");
                    continue;
                }
                pending.push(path);
            } else if file_type.is_symlink() && fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false) {
                debug!(path = %path.display(), "not following directory symlink");
            } else {
                files.push(path);
            }
        }

        pending.sort_unstable_by(|a, b| b.cmp(a));
        files.sort_unstable();

        Ok(Frame {
            dir: dir.to_path_buf(),
            pending,
            files,
        })
    }

    fn is_skipped(&self, dir: &Path) -> bool {
        match &self.skip {
            Some(skip) => fs::canonicalize(dir).map(|d| &d == skip).unwrap_or(false),
            None => false,
        }
    }

    fn batch(&self, frame: Frame) -> DirBatch {
        let relative = frame
            .dir
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        DirBatch {
            path: frame.dir,
            relative,
            files: frame.files,
        }
    }
}

impl Iterator for Walk<'_> {
    type Item = Result<DirBatch, BackupError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next_dir = self.stack.last_mut()?.pending.pop();
            match next_dir {
                Some(dir) => match self.read_frame(&dir) {
                    Ok(frame) => self.stack.push(frame),
                    Err(e) => {
                        self.stack.clear();
                        return Some(Err(map_source_error(&dir, e)));
                    }
                },
                None => {
                    let frame = self.stack.pop()?;
                    return Some(Ok(self.batch(frame)));
                }
            }
        }
    }
}

/// Canonical form of `dir` when it lies strictly inside `root`.
fn inside_root(root: &Path, dir: &Path) -> Option<PathBuf> {
    let root = fs::canonicalize(root).ok()?;
    let dir = fs::canonicalize(dir).ok()?;
    (dir != root && dir.starts_with(&root)).then_some(dir)
}
