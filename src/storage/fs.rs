//! Filesystem storage backend.
//!
//! Uses `tokio::fs` so file access never blocks the runtime's worker threads.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::trace;

use super::backend::StorageBackend;
use super::error::{Result, StorageError};

/// Local filesystem backend
#[derive(Debug, Default, Clone, Copy)]
pub struct FsBackend;

impl FsBackend {
    pub fn new() -> Self {
        Self
    }

    /// Sibling path used for write-then-rename replacement
    fn temp_path(path: &Path) -> PathBuf {
        let mut tmp = OsString::from(path.as_os_str());
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

#[async_trait]
impl StorageBackend for FsBackend {
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::from_io(path, e))
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::from_io(path, e))
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let tmp = Self::temp_path(path);
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| StorageError::from_io(&tmp, e))?;

        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StorageError::from_io(path, e));
        }

        trace!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    }
}
