use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::AbortHandle;
use tokio::time::{Duration, Instant};

use crate::expiry;

/// The Store is responsible for managing key-value pairs, with optional time-to-live settings for
/// each key.
///
/// Expired keys are never visible to readers: every read re-checks the deadline of the entry it
/// finds. On top of that, each key set with a TTL arms a timer that evicts it once the deadline
/// passes, so memory is reclaimed for keys that are never read again. The store can be shared
/// and cloned cheaply using reference counting.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Shared>,
}

pub(crate) struct Shared {
    state: RwLock<State>,
    // Every write gets a fresh version so expiry timers can tell whether the entry they were
    // armed for is still the current one.
    next_version: AtomicU64,
}

#[derive(Default)]
struct State {
    entries: HashMap<Key, Entry>,
}

type Key = String;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
    version: u64,
    timer: Option<AbortHandle>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

impl Store {
    pub fn new() -> Store {
        let inner = Arc::new(Shared {
            state: RwLock::new(State::default()),
            next_version: AtomicU64::new(0),
        });

        Self { inner }
    }

    /// Inserts or overwrites `key`. With a `ttl` the key is treated as absent once it elapses.
    pub fn set(&self, key: String, value: String, ttl: Option<Duration>) {
        let version = self.inner.next_version.fetch_add(1, Ordering::Relaxed);

        // A deadline too far out to represent is the same as no deadline at all.
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));

        let previous = {
            let mut state = self.inner.write();

            // Armed under the write guard, so the timer can only ever see this entry in place.
            let timer = expires_at.and_then(|expires_at| {
                expiry::schedule(Arc::downgrade(&self.inner), key.clone(), version, expires_at)
            });

            let entry = Entry {
                value,
                expires_at,
                version,
                timer,
            };

            state.entries.insert(key, entry)
        };

        // The timer of an overwritten entry can no longer do anything useful.
        if let Some(timer) = previous.and_then(|entry| entry.timer) {
            timer.abort();
        }
    }

    /// Returns the value of `key` if it exists and has not expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();

        let expired_version = {
            let state = self.inner.read();
            let entry = state.entries.get(key)?;
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
            entry.version
        };

        // The timer has not caught up with this key yet, evict it on its behalf.
        self.inner.remove_version(key, expired_version);
        None
    }

    /// Removes `key`, returning whether it held a live value.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.inner.write().entries.remove(key);

        match removed {
            Some(entry) => {
                if let Some(timer) = &entry.timer {
                    timer.abort();
                }
                !entry.is_expired(Instant::now())
            }
            None => false,
        }
    }

    /// Number of entries physically held, including expired ones that were not evicted yet.
    pub fn size(&self) -> usize {
        self.inner.read().entries.len()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Shared {
    // A panic while holding the lock cannot leave an entry half written, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes `key` only if its current entry is the one written with `version`.
    pub(crate) fn remove_version(&self, key: &str, version: u64) -> bool {
        let mut state = self.write();

        match state.entries.get(key) {
            Some(entry) if entry.version == version => {
                state.entries.remove(key);
                true
            }
            _ => false,
        }
    }
}
