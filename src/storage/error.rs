//! Storage error types.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur while touching the backing store.
#[derive(Debug)]
pub enum StorageError {
    /// The file does not exist
    NotFound(PathBuf),
    /// Any other IO failure
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StorageError {
    /// Classify an IO error raised while accessing `path`.
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source: err }
        }
    }

    /// Path the failed operation was targeting.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::NotFound(path) => path,
            Self::Io { path, .. } => path,
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "{} not found", path.display()),
            Self::Io { path, source } => write!(f, "IO error on {}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::NotFound(_) => None,
        }
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
