//! In-memory storage backend.
//!
//! Keeps files in a map keyed by path. Failures can be injected for
//! directory creation and writes, which makes it the backend of choice for
//! exercising the registry's error paths.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::backend::StorageBackend;
use super::error::{Result, StorageError};

/// Map-backed storage
#[derive(Debug, Default)]
pub struct MemoryBackend {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    dirs: Mutex<HashSet<PathBuf>>,
    fail_dirs: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `ensure_dir` fail with a permission error
    pub fn fail_dirs(&self, fail: bool) {
        self.fail_dirs.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `write_file` fail with an IO error
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `write_file` calls so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current content of a file, if present
    pub fn file(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().get(path).cloned()
    }

    /// Seed or overwrite a file without counting it as a write
    pub fn insert_file(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files.lock().insert(path.into(), contents.into());
    }

    /// Whether `ensure_dir` has prepared `path`
    pub fn has_dir(&self, path: &Path) -> bool {
        self.dirs.lock().contains(path)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if self.fail_dirs.load(Ordering::SeqCst) {
            return Err(StorageError::from_io(
                path,
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ));
        }
        self.dirs.lock().insert(path.to_path_buf());
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_path_buf()))
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::from_io(
                path,
                std::io::Error::other("injected write failure"),
            ));
        }
        self.files.lock().insert(path.to_path_buf(), contents.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
