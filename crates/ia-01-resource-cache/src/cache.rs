//! Single-flight read-through cache.
//!
//! Each key is either `Ready` (the resource exists) or `InFlight` (one task,
//! the leader, is creating it). Callers that find an in-flight slot subscribe
//! to the leader's broadcast and receive exactly what the leader produced,
//! value or error. Failures and cancelled leaders leave the key absent.

use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

enum Slot<V, E> {
    Ready(V),
    InFlight(broadcast::Sender<Result<V, E>>),
}

enum Claim<V, E> {
    Hit(V),
    Follow(broadcast::Receiver<Result<V, E>>),
    Lead(broadcast::Sender<Result<V, E>>),
}

/// Cache counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups answered from a ready entry.
    pub hits: AtomicU64,
    /// Lookups that found no ready entry.
    pub misses: AtomicU64,
    /// Lookups that ran the creator.
    pub creations: AtomicU64,
    /// Lookups that joined an in-flight creation.
    pub coalesced: AtomicU64,
    /// Creations that returned an error.
    pub failures: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub creations: u64,
    pub coalesced: u64,
    pub failures: u64,
}

/// Read-through cache where concurrent misses on one key share a single
/// creation.
///
/// Entries are never evicted.
pub struct ResourceCache<K, V, E> {
    entries: Mutex<HashMap<K, Slot<V, E>>>,
    stats: CacheStats,
}

impl<K, V, E> ResourceCache<K, V, E>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
    E: Clone,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stats: CacheStats::default(),
        }
    }

    /// Look up a ready entry. Never triggers a creation.
    pub fn get(&self, key: &K) -> Option<V> {
        match self.entries.lock().get(key) {
            Some(Slot::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Seed an entry for a resource that is known to exist already.
    ///
    /// Does not overwrite a ready entry. If a creation is in flight the seeded
    /// value wins and the leader's result is still delivered to its followers.
    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock();
        if !matches!(entries.get(&key), Some(Slot::Ready(_))) {
            entries.insert(key, Slot::Ready(value));
        }
    }

    /// Return the cached value for `key`, or run `creator` to produce it.
    ///
    /// Only one caller per key runs `creator` at a time; concurrent callers
    /// receive the same value or the same error. On error nothing is stored
    /// and the next call retries.
    pub async fn get_or_create<F, Fut>(&self, key: K, creator: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let sender = loop {
            match self.claim(&key) {
                Claim::Hit(value) => return Ok(value),
                Claim::Lead(sender) => break sender,
                Claim::Follow(mut receiver) => match receiver.recv().await {
                    Ok(result) => return result,
                    // Leader went away without publishing; claim again.
                    Err(_) => continue,
                },
            }
        };

        let mut guard = LeaderGuard {
            entries: &self.entries,
            key: Some(key.clone()),
        };

        debug!(key = ?key, "Cache miss, creating resource");
        self.stats.creations.fetch_add(1, Ordering::Relaxed);
        let result = creator().await;

        {
            let mut entries = self.entries.lock();
            match &result {
                Ok(value) => {
                    if !matches!(entries.get(&key), Some(Slot::Ready(_))) {
                        entries.insert(key.clone(), Slot::Ready(value.clone()));
                    }
                }
                Err(_) => {
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    if matches!(entries.get(&key), Some(Slot::InFlight(_))) {
                        entries.remove(&key);
                    }
                }
            }
            guard.disarm();
        }

        // No receivers is fine: nobody joined while we were creating.
        let _ = sender.send(result.clone());
        result
    }

    /// Number of ready entries.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// True when no entry is ready.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            creations: self.stats.creations.load(Ordering::Relaxed),
            coalesced: self.stats.coalesced.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
        }
    }

    fn claim(&self, key: &K) -> Claim<V, E> {
        let mut entries = self.entries.lock();
        match entries.entry(key.clone()) {
            Entry::Occupied(slot) => match slot.get() {
                Slot::Ready(value) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    Claim::Hit(value.clone())
                }
                Slot::InFlight(sender) => {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                    Claim::Follow(sender.subscribe())
                }
            },
            Entry::Vacant(slot) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                let (sender, _) = broadcast::channel(1);
                slot.insert(Slot::InFlight(sender.clone()));
                Claim::Lead(sender)
            }
        }
    }
}

impl<K, V, E> Default for ResourceCache<K, V, E>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the in-flight marker if the leader's future is dropped mid-creation.
struct LeaderGuard<'a, K: Eq + Hash, V, E> {
    entries: &'a Mutex<HashMap<K, Slot<V, E>>>,
    key: Option<K>,
}

impl<K: Eq + Hash, V, E> LeaderGuard<'_, K, V, E> {
    fn disarm(&mut self) {
        self.key = None;
    }
}

impl<K: Eq + Hash, V, E> Drop for LeaderGuard<'_, K, V, E> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut entries = self.entries.lock();
            if matches!(entries.get(&key), Some(Slot::InFlight(_))) {
                entries.remove(&key);
            }
        }
    }
}
