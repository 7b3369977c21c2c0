//! Per-key single-flight loading.
//!
//! The first caller that misses a key starts a flight: a shared future that
//! runs the loader once. Every concurrent caller for the same key clones and
//! awaits that future instead of running its own loader. The flight is held in
//! a [`DashMap`] keyed by [`CacheKey`], so unrelated keys only share a shard
//! lock for the instant it takes to join or start.
//!
//! A flight is not owned by the caller that started it. If that caller is
//! cancelled, any other clone keeps driving it. The map only keeps a weak
//! handle, so once every caller is gone the future is dropped with them. Either
//! way the [`FlightToken`] moved into the future removes the map entry, so a
//! later call can start a fresh flight.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, WeakShared};
use tiercache_core::{CacheKey, CacheValue, LoadError};

/// Outcome shared with every caller that joined a flight.
pub(crate) type FlightResult = Result<CacheValue, LoadError>;

/// A pending load that can be awaited by any number of callers.
pub(crate) type SharedFlight = Shared<BoxFuture<'static, FlightResult>>;

struct InFlight {
    id: u64,
    // `None` only if the future completed before it could be downgraded.
    future: Option<WeakShared<BoxFuture<'static, FlightResult>>>,
}

/// Table of in-flight loads for one cache.
pub(crate) struct SingleFlight {
    flights: Arc<DashMap<CacheKey, InFlight>>,
    next_id: AtomicU64,
}

impl SingleFlight {
    pub(crate) fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Joins the flight for `key`, or starts one with `start`.
    ///
    /// `start` runs while the map entry is locked and must only build the
    /// future, not poll it. Returns the shared future and whether this call
    /// started it.
    pub(crate) fn join_or_start<F>(&self, key: &CacheKey, start: F) -> (SharedFlight, bool)
    where
        F: FnOnce(FlightToken) -> BoxFuture<'static, FlightResult>,
    {
        match self.flights.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let joined = entry.get().future.as_ref().and_then(WeakShared::upgrade);
                match joined {
                    Some(future) => (future, false),
                    None => {
                        // Abandoned by every caller; its token is on the way out.
                        let (flight, future) = self.start(key, start);
                        entry.insert(flight);
                        (future, true)
                    }
                }
            }
            Entry::Vacant(entry) => {
                let (flight, future) = self.start(key, start);
                entry.insert(flight);
                (future, true)
            }
        }
    }

    fn start<F>(&self, key: &CacheKey, start: F) -> (InFlight, SharedFlight)
    where
        F: FnOnce(FlightToken) -> BoxFuture<'static, FlightResult>,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = FlightToken {
            flights: Arc::clone(&self.flights),
            key: key.clone(),
            id,
        };
        let future = start(token).shared();
        let weak = future.downgrade();
        (InFlight { id, future: weak }, future)
    }

    /// Number of keys with a load in progress.
    pub(crate) fn len(&self) -> usize {
        self.flights.len()
    }
}

/// Marks a flight as in progress. Dropping it releases the key.
pub(crate) struct FlightToken {
    flights: Arc<DashMap<CacheKey, InFlight>>,
    key: CacheKey,
    id: u64,
}

impl Drop for FlightToken {
    fn drop(&mut self) {
        // Only remove our own flight; a newer one may already own the key.
        self.flights
            .remove_if(&self.key, |_, flight| flight.id == self.id);
    }
}

/// A loader panicked instead of returning.
#[derive(Debug, thiserror::Error)]
#[error("loader panicked: {message}")]
pub struct LoaderPanicked {
    message: String,
}

impl LoaderPanicked {
    pub(crate) fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }

    /// The panic message, if it was a string.
    pub fn message(&self) -> &str {
        &self.message
    }
}
