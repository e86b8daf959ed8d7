//! Call Coalescer
//!
//! Collapses concurrent calls for the same key into one computation whose
//! result is shared by every caller.
//!
//! # Design
//!
//! - The map lock guards bookkeeping only; it is never held across the
//!   computation or the wait, so unrelated keys never block each other
//! - The computation runs on its own task. Callers only wait for it, so a
//!   caller that gives up does not cancel work other callers (or the cache)
//!   still want
//! - Each in-flight call owns a `tokio::sync::watch` channel: the value slot
//!   is the shared result, a change notification is the completion signal
//! - The record is removed before the result is published, so a call made
//!   after completion starts a fresh computation

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::Instrument;

use crate::error::{Error, Result};

type Slot<T> = Option<Result<T>>;

struct Flight<T> {
    id: u64,
    done: watch::Receiver<Slot<T>>,
}

struct Calls<T> {
    next_id: u64,
    in_flight: HashMap<String, Flight<T>>,
}

enum Role<T> {
    Leader(u64, watch::Sender<Slot<T>>, watch::Receiver<Slot<T>>),
    Follower(watch::Receiver<Slot<T>>),
}

/// At most one in-flight computation per key
pub struct Coalescer<T> {
    calls: Arc<Mutex<Calls<T>>>,
}

impl<T> Default for Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Removes a flight's record once its computation ends, even by panic.
struct FlightGuard<T> {
    calls: Arc<Mutex<Calls<T>>>,
    key: String,
    id: u64,
}

impl<T> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        let mut calls = self.calls.lock();
        if calls.in_flight.get(&self.key).map(|f| f.id) == Some(self.id) {
            calls.in_flight.remove(&self.key);
        }
    }
}

impl<T> Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty coalescer
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Calls {
                next_id: 0,
                in_flight: HashMap::new(),
            })),
        }
    }

    /// Run `compute` for `key` unless a call for `key` is already in flight,
    /// in which case wait for and return that call's result.
    ///
    /// `compute` is only invoked by the first caller. Its future is spawned
    /// onto the runtime and runs to completion even if every caller stops
    /// waiting.
    pub async fn run<F, Fut>(&self, key: &str, compute: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut done = match self.join(key) {
            Role::Leader(id, tx, rx) => {
                let guard = FlightGuard {
                    calls: Arc::clone(&self.calls),
                    key: key.to_string(),
                    id,
                };
                let task = compute();
                tokio::spawn(
                    async move {
                        let result = task.await;
                        drop(guard);
                        tx.send_replace(Some(result));
                    }
                    .in_current_span(),
                );
                rx
            }
            Role::Follower(rx) => rx,
        };

        // Err means the task ended without publishing, i.e. it panicked
        let published = match done.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        published.unwrap_or_else(|| {
            Err(Error::Internal(format!(
                "computation for {} ended without a result",
                key
            )))
        })
    }

    /// Number of keys currently in flight
    pub fn in_flight(&self) -> usize {
        self.calls.lock().in_flight.len()
    }

    fn join(&self, key: &str) -> Role<T> {
        let mut calls = self.calls.lock();
        if let Some(flight) = calls.in_flight.get(key) {
            return Role::Follower(flight.done.clone());
        }

        calls.next_id += 1;
        let id = calls.next_id;
        let (tx, rx) = watch::channel(None);
        calls.in_flight.insert(
            key.to_string(),
            Flight {
                id,
                done: rx.clone(),
            },
        );
        Role::Leader(id, tx, rx)
    }
}

// =============================================================================
// Tests
// =============================================================================
