//! Database Registry
//!
//! Process-wide authority over which databases are loaded. Each database
//! name owns a slot guarded by an async mutex; loading, mutation, flushing,
//! explicit close and idle eviction of a name all run under that lock, so
//! at most one document instance exists per name and first-open races
//! resolve to a single load.
//!
//! Before any per-database work, callers pass a one-time readiness gate
//! that prepares the database directory.

mod evictor;
mod throttle;

pub use evictor::IdleEvictor;
pub use throttle::WriteThrottler;

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, OnceCell, OwnedMappedMutexGuard, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::{DbConfig, Fallback};
use crate::error::{DbError, Result};
use crate::storage::StorageBackend;

/// One database: a mapping from string keys to JSON values
pub type Document = Map<String, Value>;

/// Placeholder written for a database that has no file yet
const EMPTY_DOCUMENT: &[u8] = b"{}";

/// In-memory state of one name; `None` while closed
type Slot = Arc<Mutex<Option<Document>>>;

/// Exclusive access to a loaded database.
///
/// Holding this value keeps every other operation on the same database
/// (including idle eviction) waiting.
pub struct OpenDatabase {
    name: String,
    document: OwnedMappedMutexGuard<Option<Document>, Document>,
    fallback: Fallback,
}

impl OpenDatabase {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored value for `key`, or `default` according to the fallback rule
    pub fn get(&self, key: &str, default: Value) -> Value {
        match self.document.get(key) {
            Some(value) if !substitutes(self.fallback, value) => value.clone(),
            _ => default,
        }
    }

    /// Overwrite `key` in memory. Nothing reaches disk until a flush.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.document.insert(key.into(), value);
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

/// Whether a stored value is replaced by the caller's default
fn substitutes(fallback: Fallback, value: &Value) -> bool {
    match fallback {
        Fallback::Absent => false,
        Fallback::Falsy => match value {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::String(s) => s.is_empty(),
            Value::Array(_) | Value::Object(_) => false,
        },
    }
}

/// Database names become a single filename component
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return Err(DbError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Registry of open databases
pub struct Registry {
    config: DbConfig,
    backend: Arc<dyn StorageBackend>,
    /// Outcome of preparing the database directory, computed once
    ready: OnceCell<std::result::Result<(), String>>,
    slots: DashMap<String, Slot>,
    evictor: IdleEvictor,
    throttler: WriteThrottler,
}

impl Registry {
    pub fn new(config: DbConfig, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            evictor: IdleEvictor::new(config.idle_timeout),
            throttler: WriteThrottler::new(config.flush_interval),
            config,
            backend,
            ready: OnceCell::new(),
            slots: DashMap::new(),
        }
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn evictor(&self) -> &IdleEvictor {
        &self.evictor
    }

    pub fn throttler(&self) -> &WriteThrottler {
        &self.throttler
    }

    /// Path of the file backing `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.config.database_path(name)
    }

    /// Wait for the database directory to be prepared.
    ///
    /// The first caller creates it; everyone else waits on the same
    /// outcome. A failure is permanent for this registry.
    pub async fn ready(&self) -> Result<()> {
        let outcome = self
            .ready
            .get_or_init(|| async {
                match self.backend.ensure_dir(&self.config.location).await {
                    Ok(()) => {
                        debug!("Database location ready: {}", self.config.location.display());
                        Ok(())
                    }
                    Err(e) => {
                        error!("Database location could not be prepared: {}", e);
                        Err(e.to_string())
                    }
                }
            })
            .await;

        outcome.clone().map_err(DbError::Instantiation)
    }

    /// Make sure `name` is loaded and lock it.
    ///
    /// Re-arms the idle timer, then loads the document from disk if it is
    /// not in memory, creating an empty file for a database seen for the
    /// first time.
    pub async fn open(self: &Arc<Self>, name: &str) -> Result<OpenDatabase> {
        validate_name(name)?;
        self.ready().await?;
        self.touch(name);

        let slot = self.slot(name);
        let mut guard = slot.clone().lock_owned().await;

        if guard.is_none() {
            match self.load(name).await {
                Ok(document) => {
                    debug!("Loaded '{}' ({} keys)", name, document.len());
                    *guard = Some(document);
                }
                Err(e) => {
                    drop(guard);
                    self.prune(name, &slot);
                    return Err(e);
                }
            }
        }

        let document = OwnedMutexGuard::map(guard, |slot| slot.get_or_insert_with(Document::new));
        Ok(OpenDatabase {
            name: name.to_string(),
            document,
            fallback: self.config.fallback,
        })
    }

    /// Flush `database` unless a flush for it is still in flight
    pub async fn request_flush(&self, database: &OpenDatabase) -> Result<()> {
        self.throttler
            .run(
                database.name(),
                self.write_document(database.name(), database.document()),
            )
            .await
    }

    /// Flush `name` and unload it.
    ///
    /// On a flush failure the document stays in memory so the caller can
    /// retry. Closing a database that is not open only cancels its timer.
    pub async fn close(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        self.ready().await?;
        self.evictor.cancel(name);

        let Some(slot) = self.existing_slot(name) else {
            return Ok(());
        };

        let mut guard = slot.lock().await;
        if let Some(document) = guard.as_ref() {
            self.write_document(name, document).await?;
            *guard = None;
            info!("Closed '{}'", name);
        }
        drop(guard);

        self.prune(name, &slot);
        Ok(())
    }

    /// Close every open database and cancel all idle timers.
    ///
    /// Every database is attempted; the first failure is returned.
    pub async fn shutdown(&self) -> Result<()> {
        self.evictor.cancel_all();

        let names: Vec<String> = self.slots.iter().map(|entry| entry.key().clone()).collect();
        let mut first_error = None;

        for name in names {
            if let Err(e) = self.close(&name).await {
                error!("Failed to close '{}' on shutdown: {}", name, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Whether `name` is loaded in memory
    pub async fn is_open(&self, name: &str) -> bool {
        match self.existing_slot(name) {
            Some(slot) => {
                let open = slot.lock().await.is_some();
                if !open {
                    // A close that ran while we held the slot could not drop it
                    self.prune(name, &slot);
                }
                open
            }
            None => false,
        }
    }

    /// Names of all loaded databases, sorted
    pub async fn open_databases(&self) -> Vec<String> {
        let slots: Vec<(String, Slot)> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut names = Vec::new();
        for (name, slot) in slots {
            if slot.lock().await.is_some() {
                names.push(name);
            } else {
                self.prune(&name, &slot);
            }
        }
        names.sort();
        names
    }

    /// Record activity on `name`
    fn touch(self: &Arc<Self>, name: &str) {
        let registry = Arc::downgrade(self);
        let owned = name.to_string();
        self.evictor.touch(name, move |generation| async move {
            if let Some(registry) = registry.upgrade() {
                registry.evict(&owned, generation).await;
            }
        });
    }

    /// Timer-driven close. Best effort: the document is dropped even if
    /// the final flush fails.
    async fn evict(&self, name: &str, generation: u64) {
        if !self.evictor.expire(name, generation) {
            return;
        }

        let Some(slot) = self.existing_slot(name) else {
            return;
        };

        let mut guard = slot.lock().await;

        // Activity while we waited for the lock re-armed the timer
        if self.evictor.is_armed(name) {
            debug!("Eviction of '{}' skipped, database is active again", name);
            return;
        }

        if let Some(document) = guard.take() {
            match self.write_document(name, &document).await {
                Ok(()) => info!("Evicted idle database '{}'", name),
                Err(e) => warn!("Evicted idle database '{}' without a final flush: {}", name, e),
            }
        }
        drop(guard);

        self.prune(name, &slot);
    }

    /// Read `name` from disk, creating an empty document first if needed
    async fn load(&self, name: &str) -> Result<Document> {
        let path = self.path_for(name);

        if !self.backend.exists(&path).await {
            self.backend
                .write_file(&path, EMPTY_DOCUMENT)
                .await
                .map_err(|source| DbError::Create {
                    database: name.to_string(),
                    source,
                })?;
            info!("Created database '{}' at {}", name, path.display());
        }

        let bytes = self
            .backend
            .read_file(&path)
            .await
            .map_err(|source| DbError::Read {
                database: name.to_string(),
                source,
            })?;

        serde_json::from_slice(&bytes).map_err(|source| DbError::Parse {
            database: name.to_string(),
            source,
        })
    }

    /// Serialize the whole document and replace the file with it
    async fn write_document(&self, name: &str, document: &Document) -> Result<()> {
        let bytes = serde_json::to_vec(document).map_err(DbError::Encode)?;
        self.backend
            .write_file(&self.path_for(name), &bytes)
            .await
            .map_err(|source| DbError::Flush {
                database: name.to_string(),
                source,
            })?;

        debug!("Flushed '{}' ({} keys, {} bytes)", name, document.len(), bytes.len());
        Ok(())
    }

    fn slot(&self, name: &str) -> Slot {
        self.slots.entry(name.to_string()).or_default().clone()
    }

    fn existing_slot(&self, name: &str) -> Option<Slot> {
        self.slots.get(name).map(|slot| slot.clone())
    }

    /// Drop the slot for `name` if it is closed and nobody else holds it
    fn prune(&self, name: &str, slot: &Slot) {
        self.slots.remove_if(name, |_, current| {
            Arc::ptr_eq(current, slot) && Arc::strong_count(current) == 2
        });
    }
}
