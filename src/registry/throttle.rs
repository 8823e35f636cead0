//! Per-database write throttling.
//!
//! At most one flush per database is in flight. After a flush finishes the
//! database stays marked for the configured window, and any flush requested
//! meanwhile is rejected with `Busy`. The rejected caller's data is still in
//! the in-memory document and will be carried by the next flush.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use tracing::{trace, warn};

use crate::error::{DbError, Result};

/// Gate serializing flushes per database name
pub struct WriteThrottler {
    /// Cooldown after each flush; `None` releases immediately
    window: Option<Duration>,
    /// Names with a flush in flight or cooling down
    in_flight: Arc<DashSet<String>>,
}

/// Marks a database as in flight until dropped
struct FlushPermit<'a> {
    throttler: &'a WriteThrottler,
    name: String,
}

impl Drop for FlushPermit<'_> {
    fn drop(&mut self) {
        self.throttler.release(std::mem::take(&mut self.name));
    }
}

impl WriteThrottler {
    pub fn new(window: Option<Duration>) -> Self {
        Self {
            window,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Whether `name` currently rejects flushes
    pub fn is_in_flight(&self, name: &str) -> bool {
        self.in_flight.contains(name)
    }

    /// Run `flush` unless a flush for `name` is already in flight.
    ///
    /// `flush` is not polled at all when the request is rejected. Its
    /// outcome is returned as-is; the throttle window starts once it
    /// completes, or is dropped.
    pub async fn run<F>(&self, name: &str, flush: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        let _permit = self.try_begin(name).ok_or_else(|| {
            warn!("Flush of '{}' rejected, previous flush still in flight", name);
            DbError::Busy {
                database: name.to_string(),
            }
        })?;

        flush.await
    }

    fn try_begin(&self, name: &str) -> Option<FlushPermit<'_>> {
        // DashSet::insert is the compare-and-set: only one caller wins
        if self.in_flight.insert(name.to_string()) {
            Some(FlushPermit {
                throttler: self,
                name: name.to_string(),
            })
        } else {
            None
        }
    }

    fn release(&self, name: String) {
        let Some(window) = self.window else {
            self.in_flight.remove(&name);
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let in_flight = self.in_flight.clone();
                handle.spawn(async move {
                    tokio::time::sleep(window).await;
                    in_flight.remove(&name);
                    trace!("Throttle window for '{}' elapsed", name);
                });
            }
            Err(_) => {
                // No runtime to time the window on
                self.in_flight.remove(&name);
            }
        }
    }
}
