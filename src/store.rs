//! Public store API.
//!
//! A [`Store`] is the handle an application keeps for its lifetime. It is
//! cheap to clone; all clones share one registry.
//!
//! Idle timers and throttle windows run on the ambient Tokio runtime. When
//! used outside one, databases are never auto-closed and throttle windows
//! end as soon as each flush completes.
//!
//! ```no_run
//! # async fn example() -> jsonkv::Result<()> {
//! use jsonkv::{DbConfig, Store};
//! use serde_json::json;
//!
//! let store = Store::new(DbConfig::default());
//! store.write("settings", "theme", &"dark").await?;
//! let theme = store.read("settings", "theme", json!("light")).await?;
//! assert_eq!(theme, json!("dark"));
//! store.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::DbConfig;
use crate::error::{DbError, Result};
use crate::registry::Registry;
use crate::storage::{FsBackend, StorageBackend};

/// Handle to the key-value store
#[derive(Clone)]
pub struct Store {
    registry: Arc<Registry>,
}

impl Store {
    /// Create a store on the local filesystem
    pub fn new(config: DbConfig) -> Self {
        Self::with_backend(config, Arc::new(FsBackend::new()))
    }

    /// Create a store on a custom backend.
    ///
    /// When called inside a Tokio runtime, preparing the database directory
    /// starts right away; otherwise it happens on first use.
    pub fn with_backend(config: DbConfig, backend: Arc<dyn StorageBackend>) -> Self {
        let registry = Arc::new(Registry::new(config, backend));

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let registry = registry.clone();
            handle.spawn(async move {
                // Failure is cached and reported by the first operation
                let _ = registry.ready().await;
            });
        }

        Self { registry }
    }

    /// Store `value` under `key` in `database` and flush the database.
    ///
    /// On `Busy` the value is already in memory and will be persisted by
    /// the next successful flush; only its durability is unconfirmed.
    pub async fn write<V>(&self, database: &str, key: &str, value: &V) -> Result<()>
    where
        V: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value).map_err(DbError::Encode)?;

        let mut db = self.registry.open(database).await?;
        db.set(key, value);
        self.registry.request_flush(&db).await
    }

    /// Value stored under `key` in `database`, or `default`.
    ///
    /// Under the default [`Fallback::Falsy`](crate::Fallback::Falsy) rule
    /// a stored `null`, `false`, `0` or `""` also yields `default`.
    pub async fn read(&self, database: &str, key: &str, default: Value) -> Result<Value> {
        let db = self.registry.open(database).await?;
        Ok(db.get(key, default))
    }

    /// Typed variant of [`Store::read`]
    pub async fn read_as<T>(&self, database: &str, key: &str, default: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let default = serde_json::to_value(default).map_err(DbError::Encode)?;
        let value = self.read(database, key, default).await?;
        serde_json::from_value(value).map_err(|source| DbError::Decode {
            database: database.to_string(),
            key: key.to_string(),
            source,
        })
    }

    /// Flush `database` and unload it from memory
    pub async fn close(&self, database: &str) -> Result<()> {
        self.registry.close(database).await
    }

    /// Flush and unload every open database. The store stays usable;
    /// later operations reload from disk.
    pub async fn shutdown(&self) -> Result<()> {
        self.registry.shutdown().await
    }

    /// Whether `database` is currently loaded in memory
    pub async fn is_open(&self, database: &str) -> bool {
        self.registry.is_open(database).await
    }

    /// Names of all databases currently loaded in memory
    pub async fn open_databases(&self) -> Vec<String> {
        self.registry.open_databases().await
    }

    pub fn config(&self) -> &DbConfig {
        self.registry.config()
    }

    /// Path of the file backing `database`
    pub fn path_for(&self, database: &str) -> PathBuf {
        self.registry.path_for(database)
    }

    /// The registry behind this store
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}
