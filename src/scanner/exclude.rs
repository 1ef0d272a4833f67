//! Exclude pattern matching

use crate::types::BackupError;
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Compiled exclude globs
///
/// A pattern containing `/` is matched against the whole source-relative
/// path (`DCIM/.thumbnails/**`). A pattern without one is matched against
/// the entry's file name only, at any depth (`*.AAE`, `.trashed`).
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    by_path: GlobSet,
    by_name: GlobSet,
    empty: bool,
}

impl ExcludeMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, BackupError> {
        let mut by_path = GlobSetBuilder::new();
        let mut by_name = GlobSetBuilder::new();

        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            let trimmed = pattern.trim_start_matches("./").trim_end_matches('/');
            if trimmed.contains('/') {
                by_path.add(compile(trimmed, pattern)?);
            } else {
                by_name.add(compile(trimmed, pattern)?);
            }
        }

        let build = |builder: GlobSetBuilder| {
            builder
                .build()
                .map_err(|e| BackupError::Config(format!("Failed to build exclude set: {}", e)))
        };

        let by_path = build(by_path)?;
        let by_name = build(by_name)?;
        let empty = by_path.is_empty() && by_name.is_empty();
        Ok(Self {
            by_path,
            by_name,
            empty,
        })
    }

    /// Matcher that excludes nothing.
    pub fn none() -> Self {
        Self {
            by_path: GlobSet::empty(),
            by_name: GlobSet::empty(),
            empty: true,
        }
    }

    /// True when `relative` (a path under the source root) is excluded.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        if self.empty {
            return false;
        }
        if self.by_path.is_match(relative) {
            return true;
        }
        relative
            .file_name()
            .map(|name| self.by_name.is_match(Path::new(name)))
            .unwrap_or(false)
    }
}

impl Default for ExcludeMatcher {
    fn default() -> Self {
        Self::none()
    }
}

fn compile(glob: &str, original: &str) -> Result<Glob, BackupError> {
    GlobBuilder::new(glob)
        .literal_separator(true)
        .build()
        .map_err(|e| BackupError::Config(format!("Invalid exclude pattern '{}': {}", original, e)))
}
