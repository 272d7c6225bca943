//! Single-flight execution of cold reads.
//!
//! When a value is missing, many callers may notice at once. Only the first
//! one starts an *episode*: a worker thread that double-checks the primary
//! read and, if the value is still missing, runs the fallback exactly once.
//! Every caller that missed while the episode was open waits for the same
//! outcome, success or failure.
//!
//! The worker owns the episode. A caller that stops waiting (see
//! [`SingleFlight::run`]'s `wait`) does not stop it, so the value still gets
//! persisted for everybody else.
//!
//! Episodes are per key: cold reads of different keys never wait on each
//! other.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::error::{PrefError, PrefResult};

/// Outcome of a primary read.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    Found(T),
    Miss,
}

/// One in-flight episode: a write-once result slot plus its waiters.
struct Flight<T> {
    outcome: Mutex<Option<PrefResult<T>>>,
    done: Condvar,
}

impl<T: Clone> Flight<T> {
    fn new() -> Self {
        Self { outcome: Mutex::new(None), done: Condvar::new() }
    }

    /// Publish the outcome. Only the first call has an effect.
    fn complete(&self, outcome: PrefResult<T>) {
        let mut slot = self.outcome.lock();
        if slot.is_none() {
            *slot = Some(outcome);
            self.done.notify_all();
        }
    }

    /// Block until the outcome is published or `limit` elapses.
    fn wait(&self, limit: Option<Duration>) -> Option<PrefResult<T>> {
        let mut slot = self.outcome.lock();
        match limit {
            None => {
                while slot.is_none() {
                    self.done.wait(&mut slot);
                }
            }
            Some(limit) => {
                let deadline = Instant::now() + limit;
                while slot.is_none() {
                    if self.done.wait_until(&mut slot, deadline).timed_out() {
                        break;
                    }
                }
            }
        }
        slot.clone()
    }
}

type FlightMap<K, T> = Arc<Mutex<HashMap<K, Arc<Flight<T>>>>>;

/// Closes an episode when the worker finishes, or dies.
///
/// Dropping without a published outcome (panic in the fallback, failed
/// spawn) completes the episode with `MaterializationFailure` so no waiter
/// hangs.
struct EpisodeGuard<K: Eq + Hash + fmt::Display, T: Clone> {
    key: K,
    flight: Arc<Flight<T>>,
    flights: FlightMap<K, T>,
}

impl<K: Eq + Hash + fmt::Display, T: Clone> EpisodeGuard<K, T> {
    fn finish(self, outcome: PrefResult<T>) {
        self.flight.complete(outcome);
    }
}

impl<K: Eq + Hash + fmt::Display, T: Clone> Drop for EpisodeGuard<K, T> {
    fn drop(&mut self) {
        {
            let mut flights = self.flights.lock();
            if flights.get(&self.key).is_some_and(|f| Arc::ptr_eq(f, &self.flight)) {
                flights.remove(&self.key);
            }
        }
        self.flight.complete(Err(PrefError::MaterializationFailure {
            key: self.key.to_string(),
            reason: "materialization stopped before producing a value".to_string(),
            cause: None,
        }));
    }
}

/// Collapses concurrent misses of the same key into one fallback run.
pub struct SingleFlight<K, T> {
    op: &'static str,
    flights: FlightMap<K, T>,
    episodes: Arc<AtomicU64>,
}

impl<K, T> Clone for SingleFlight<K, T> {
    fn clone(&self) -> Self {
        Self {
            op: self.op,
            flights: Arc::clone(&self.flights),
            episodes: Arc::clone(&self.episodes),
        }
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    /// `op` names the operation in logs and worker thread names.
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            flights: Arc::new(Mutex::new(HashMap::new())),
            episodes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run `primary`; on a miss, make sure `fallback` runs once for all
    /// concurrent missers of `key` and return its outcome.
    ///
    /// - `Found` and errors from the first `primary` call return directly,
    ///   without touching any lock.
    /// - The episode worker calls `primary` once more before `fallback`: a
    ///   previous episode may have persisted the value in the meantime.
    /// - With `wait = Some(limit)` a caller returns `Timeout` after `limit`;
    ///   the episode keeps running.
    pub fn run<P, F>(&self, key: K, primary: P, fallback: F, wait: Option<Duration>) -> PrefResult<T>
    where
        P: Fn() -> PrefResult<Probe<T>> + Send + 'static,
        F: FnOnce() -> PrefResult<T> + Send + 'static,
    {
        if let Probe::Found(value) = primary()? {
            return Ok(value);
        }

        let (flight, leader) = {
            let mut flights = self.flights.lock();
            match flights.entry(key.clone()) {
                Entry::Occupied(existing) => (Arc::clone(existing.get()), false),
                Entry::Vacant(slot) => {
                    let flight = Arc::new(Flight::new());
                    slot.insert(Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if leader {
            self.launch(key.clone(), Arc::clone(&flight), primary, fallback);
        }

        flight.wait(wait).unwrap_or_else(|| {
            Err(PrefError::Timeout { key: key.to_string(), waited: wait.unwrap_or_default() })
        })
    }

    fn launch<P, F>(&self, key: K, flight: Arc<Flight<T>>, primary: P, fallback: F)
    where
        P: Fn() -> PrefResult<Probe<T>> + Send + 'static,
        F: FnOnce() -> PrefResult<T> + Send + 'static,
    {
        self.episodes.fetch_add(1, Ordering::Relaxed);
        let op = self.op;
        let guard = EpisodeGuard { key: key.clone(), flight, flights: Arc::clone(&self.flights) };

        let spawned = thread::Builder::new()
            .name(format!("{op}-{key}"))
            .spawn(move || {
                let outcome = match primary() {
                    Ok(Probe::Found(value)) => Ok(value),
                    Ok(Probe::Miss) => {
                        debug!(op, key = %guard.key, "running fallback");
                        fallback()
                    }
                    Err(e) => Err(e),
                };
                guard.finish(outcome);
            });

        // On failure the closure, and with it the guard, is already dropped
        if let Err(e) = spawned {
            error!(op, key = %key, error = %e, "failed to spawn materialization worker");
        }
    }

    /// Episodes started since creation.
    pub fn episodes(&self) -> u64 {
        self.episodes.load(Ordering::Relaxed)
    }

    /// Episodes currently open.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }
}
