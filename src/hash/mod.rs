//! Content fingerprinting

use crate::types::{map_source_error, BackupError};
use serde::{Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// BLAKE3 digest of a file's full contents. The sole dedup key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, the form stored in the ledger.
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        blake3::Hash::from_hex(s)
            .map(|hash| Self(*hash.as_bytes()))
            .map_err(|e| BackupError::Validation(format!("Invalid fingerprint '{}': {}", s, e)))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Compute the fingerprint of a file
///
/// The file is streamed in 64KB chunks; every byte is read, no size or mtime
/// shortcut is taken. Read failures are classified as source errors so a
/// device that disappears mid-hash surfaces as
/// [`BackupError::SourceDisconnected`].
///
/// # Example
/// ```no_run
/// use shoebox::hash::compute_fingerprint;
/// use std::path::Path;
///
/// let fingerprint = compute_fingerprint(Path::new("IMG_0001.HEIC"))?;
/// println!("{}", fingerprint);
/// # Ok::<(), shoebox::BackupError>(())
/// ```
pub fn compute_fingerprint(file_path: &Path) -> Result<Fingerprint, BackupError> {
    fingerprint_with(file_path, map_source_error)
}

/// Fingerprint a file, classifying IO errors with `classify`.
pub(crate) fn fingerprint_with(
    file_path: &Path,
    classify: fn(&Path, std::io::Error) -> BackupError,
) -> Result<Fingerprint, BackupError> {
    let mut file = File::open(file_path).map_err(|e| classify(file_path, e))?;

    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| classify(file_path, e))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[0..bytes_read]);
    }

    Ok(Fingerprint(*hasher.finalize().as_bytes()))
}
