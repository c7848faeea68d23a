//! Shared station state.
//!
//! The watched and current sets live behind a single mutex. Every mutation
//! re-evaluates occupancy while still holding the lock, so the value pushed
//! to the consumer always matches the state that produced it.
//!
//! Background tasks also hold the output gate from mutation until the value
//! is on the channel. Values therefore reach the consumer in the order the
//! mutations happened, and the last value pushed reflects the latest state.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::api::models::{MacAddress, OccupancyPolicy, StationEvent};

#[derive(Debug)]
struct Stations {
    watched: HashSet<MacAddress>,
    current: HashSet<MacAddress>,
    policy: OccupancyPolicy,
}

impl Stations {
    fn occupied(&self) -> bool {
        self.policy.evaluate(&self.watched, &self.current)
    }
}

/// Cloneable handle to the state shared by a source and its background tasks.
#[derive(Debug, Clone)]
pub(crate) struct SharedState {
    inner: Arc<Mutex<Stations>>,
    output: Arc<AsyncMutex<()>>,
}

impl SharedState {
    pub(crate) fn new(watched: HashSet<MacAddress>, policy: OccupancyPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Stations {
                watched,
                current: HashSet::new(),
                policy,
            })),
            output: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Waits for exclusive use of the output channel.
    ///
    /// Hold the guard across the mutation and the push of its result.
    pub(crate) async fn lock_output(&self) -> AsyncMutexGuard<'_, ()> {
        self.output.lock().await
    }

    fn lock(&self) -> MutexGuard<'_, Stations> {
        // The sets stay consistent even if a holder panicked mid-evaluation.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Evaluates occupancy against the current snapshot.
    pub(crate) fn is_occupied(&self) -> bool {
        self.lock().occupied()
    }

    /// Replaces the current station set wholesale and returns the new occupancy.
    pub(crate) fn replace_stations(&self, stations: HashSet<MacAddress>) -> bool {
        let mut state = self.lock();
        state.current = stations;
        state.occupied()
    }

    /// Applies a single association change and returns the new occupancy.
    pub(crate) fn apply(&self, event: StationEvent) -> bool {
        let mut state = self.lock();
        match event {
            StationEvent::Added(mac) => {
                state.current.insert(mac);
            }
            StationEvent::Removed(mac) => {
                state.current.remove(&mac);
            }
        }
        state.occupied()
    }

    /// Evaluates a transient station set against the watched addresses
    /// without storing it.
    pub(crate) fn evaluate_with(&self, stations: &HashSet<MacAddress>) -> bool {
        let state = self.lock();
        state.policy.evaluate(&state.watched, stations)
    }

    /// Adds a watched address. Returns `false` if it was already watched.
    pub(crate) fn watch_address(&self, mac: MacAddress) -> bool {
        self.lock().watched.insert(mac)
    }

    /// Removes a watched address. Returns `false` if it was not watched.
    pub(crate) fn unwatch_address(&self, mac: &MacAddress) -> bool {
        self.lock().watched.remove(mac)
    }

    pub(crate) fn policy(&self) -> OccupancyPolicy {
        self.lock().policy
    }

    pub(crate) fn watched(&self) -> HashSet<MacAddress> {
        self.lock().watched.clone()
    }

    pub(crate) fn current(&self) -> HashSet<MacAddress> {
        self.lock().current.clone()
    }
}
