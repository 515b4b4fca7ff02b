//! Error types for the entry store

use crate::codec::CodecError;
use memo_key::CacheKey;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum StoreError {
    /// `fetch` on a key with no record
    MissingEntry(CacheKey),
    /// Record exists but its blob is gone or unreadable
    CorruptEntry {
        key: CacheKey,
        path: PathBuf,
        source: CodecError,
    },
    /// Blob could not be durably written; nothing was recorded
    Write { path: PathBuf, source: CodecError },
    Database(Box<rusqlite::Error>),
    Io(Box<std::io::Error>),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::MissingEntry(key) => write!(f, "No entry for key {}", key),
            StoreError::CorruptEntry { key, path, source } => write!(
                f,
                "Corrupt entry {} at {}: {}",
                key,
                path.display(),
                source
            ),
            StoreError::Write { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
            StoreError::Database(err) => write!(f, "Database error: {}", err),
            StoreError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::CorruptEntry { source, .. } => Some(source),
            StoreError::Write { source, .. } => Some(source),
            StoreError::Database(err) => Some(err.as_ref()),
            StoreError::Io(err) => Some(err.as_ref()),
            StoreError::MissingEntry(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(Box::new(err))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
