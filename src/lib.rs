//! jsonkv - Embedded key-value store backed by JSON documents
//!
//! Each named database is one JSON object persisted as `<name>.db.json`.
//! Databases load on first access, flush on every write (subject to an
//! optional throttle window) and unload after a period of inactivity.

pub mod config;
pub mod error;
pub mod registry;
pub mod storage;
pub mod store;

pub use config::{Config, DbConfig, DbOptions, Fallback};
pub use error::{DbError, Result};
pub use registry::{Document, OpenDatabase, Registry};
pub use storage::{FsBackend, MemoryBackend, StorageBackend, StorageError};
pub use store::Store;
