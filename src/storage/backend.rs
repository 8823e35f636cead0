//! Storage backend trait.
//!
//! The registry only ever needs whole-file semantics: read everything,
//! replace everything, check presence, and prepare the parent directory.

use std::path::Path;

use async_trait::async_trait;

use super::error::Result;

/// Byte-level storage primitives used by the database registry
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Create `path` (and its parents). Succeeds if it already exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()>;

    /// Whether a file exists at `path`. IO failures count as absent.
    async fn exists(&self, path: &Path) -> bool;

    /// Read the whole file
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replace the whole file content
    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()>;
}
