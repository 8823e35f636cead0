//! Storage module for jsonkv.
//!
//! The only part of the crate that touches the filesystem. Each database is
//! a single file, so backends expose whole-file primitives:
//! - `FsBackend` (default) - local files via `tokio::fs`
//! - `MemoryBackend` - in-process map with failure injection

mod backend;
mod error;
mod fs;
mod memory;

pub use backend::StorageBackend;
pub use error::{Result, StorageError};
pub use fs::FsBackend;
pub use memory::MemoryBackend;
