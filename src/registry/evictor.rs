//! Idle timers.
//!
//! One timer slot per database name. Every access re-arms the slot; when a
//! timer runs out the registry flushes and unloads the database.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{trace, warn};

/// An armed timer
struct Timer {
    generation: u64,
    handle: AbortHandle,
}

/// Per-database idle timers
pub struct IdleEvictor {
    /// Inactivity period; `None` disables auto-close
    timeout: Option<Duration>,
    timers: DashMap<String, Timer>,
    generation: AtomicU64,
}

impl IdleEvictor {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            timers: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Record activity on `name`: cancel its timer and, unless auto-close is
    /// disabled, arm a new one.
    ///
    /// `on_idle` is handed the new timer's generation and its future runs
    /// when the timer fires. It should call [`IdleEvictor::expire`] first.
    pub fn touch<F, Fut>(&self, name: &str, on_idle: F)
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(timeout) = self.timeout else {
            self.cancel(name);
            return;
        };

        let Ok(runtime) = Handle::try_current() else {
            warn!("No Tokio runtime, idle timer for '{}' not armed", name);
            self.cancel(name);
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let fire = on_idle(generation);

        // Spawn while holding the entry so the timer cannot observe a
        // stale slot, even with a zero timeout.
        match self.timers.entry(name.to_string()) {
            Entry::Occupied(mut occupied) => {
                let handle = spawn_timer(&runtime, timeout, fire);
                let previous = occupied.insert(Timer { generation, handle });
                previous.handle.abort();
            }
            Entry::Vacant(vacant) => {
                let handle = spawn_timer(&runtime, timeout, fire);
                vacant.insert(Timer { generation, handle });
            }
        }

        trace!("Idle timer for '{}' armed ({:?})", name, timeout);
    }

    /// Detach a fired timer. Returns false if the timer was replaced or
    /// cancelled in the meantime, in which case eviction must not proceed.
    pub fn expire(&self, name: &str, generation: u64) -> bool {
        self.timers
            .remove_if(name, |_, timer| timer.generation == generation)
            .is_some()
    }

    /// Whether `name` has an armed timer
    pub fn is_armed(&self, name: &str) -> bool {
        self.timers.contains_key(name)
    }

    /// Cancel the timer for `name`, if any
    pub fn cancel(&self, name: &str) {
        if let Some((_, timer)) = self.timers.remove(name) {
            timer.handle.abort();
        }
    }

    /// Cancel every timer
    pub fn cancel_all(&self) {
        self.timers.retain(|_, timer| {
            timer.handle.abort();
            false
        });
    }

    /// Number of armed timers
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Drop for IdleEvictor {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

fn spawn_timer<Fut>(runtime: &Handle, timeout: Duration, fire: Fut) -> AbortHandle
where
    Fut: Future<Output = ()> + Send + 'static,
{
    runtime
        .spawn(async move {
            tokio::time::sleep(timeout).await;
            fire.await;
        })
        .abort_handle()
}
