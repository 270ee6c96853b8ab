//! Query Cache module
//!
//! Caches read results per [`QueryKey`]. Identical concurrent reads share
//! one fetch, failures are never cached, and writes invalidate by key
//! prefix instead of patching cached values.

pub mod client;
pub mod keys;
pub mod pagination;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub use client::EventsClient;
pub use pagination::InfinitePages;

/// Ordered key segments; invalidation matches on prefixes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Append a segment
    pub fn push(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

struct Cached {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
    epoch: u64,
}

#[derive(Default)]
struct Slot {
    // Held across the fetch: one fetch per key at a time
    value: tokio::sync::Mutex<Option<Cached>>,
    epoch: AtomicU64,
}

/// Per-process read cache
#[derive(Default)]
pub struct QueryCache {
    slots: Mutex<HashMap<QueryKey, Arc<Slot>>>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache").field("keys", &self.key_count()).finish()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<QueryKey, Arc<Slot>>> {
        // A panic while holding the map cannot leave it inconsistent
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot(&self, key: &QueryKey) -> Arc<Slot> {
        self.slots().entry(key.clone()).or_default().clone()
    }

    /// Number of keys tracked
    pub fn key_count(&self) -> usize {
        self.slots().len()
    }

    /// Return the cached value if fresh, otherwise run `fetcher`.
    ///
    /// Concurrent calls for the same key wait for the running fetch and
    /// reuse its result. A value whose key was invalidated while it was
    /// being fetched is returned to its caller but not cached.
    pub async fn fetch<T, E, F, Fut>(
        &self,
        key: QueryKey,
        stale_time: Duration,
        fetcher: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let slot = self.slot(&key);
        let mut guard = slot.value.lock().await;
        let epoch = slot.epoch.load(Ordering::SeqCst);

        if let Some(cached) = guard.as_ref() {
            if cached.epoch == epoch && cached.fetched_at.elapsed() < stale_time {
                if let Ok(value) = cached.value.clone().downcast::<T>() {
                    tracing::trace!(key = %key, "Query cache hit");
                    return Ok(T::clone(&value));
                }
            }
        }

        tracing::trace!(key = %key, "Query cache miss");
        let value = fetcher().await?;

        *guard = if slot.epoch.load(Ordering::SeqCst) == epoch {
            Some(Cached {
                value: Arc::new(value.clone()),
                fetched_at: Instant::now(),
                epoch,
            })
        } else {
            None
        };
        Ok(value)
    }

    /// Store a value directly, as if just fetched
    pub async fn insert<T>(&self, key: QueryKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        let slot = self.slot(&key);
        let mut guard = slot.value.lock().await;
        *guard = Some(Cached {
            value: Arc::new(value),
            fetched_at: Instant::now(),
            epoch: slot.epoch.load(Ordering::SeqCst),
        });
    }

    /// Mark every entry under `prefix` stale, returning how many keys matched
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut slots = self.slots();
        let mut matched = 0;
        for (key, slot) in slots.iter() {
            if key.starts_with(prefix) {
                slot.epoch.fetch_add(1, Ordering::SeqCst);
                matched += 1;
            }
        }
        // Entries nobody is using can go right away
        slots.retain(|key, slot| !key.starts_with(prefix) || Arc::strong_count(slot) > 1);

        if matched > 0 {
            tracing::debug!(prefix = %prefix, keys = matched, "Query cache invalidated");
        }
        matched
    }

    /// Whether `key` holds a value that is current and younger than `stale_time`
    pub fn is_fresh(&self, key: &QueryKey, stale_time: Duration) -> bool {
        let Some(slot) = self.slots().get(key).cloned() else {
            return false;
        };
        let epoch = slot.epoch.load(Ordering::SeqCst);
        let fresh = match slot.value.try_lock() {
            Ok(guard) => guard
                .as_ref()
                .map_or(false, |c| c.epoch == epoch && c.fetched_at.elapsed() < stale_time),
            Err(_) => false,
        };
        fresh
    }

    /// Drop idle entries fetched more than `age` ago, returning how many went
    pub fn evict_older_than(&self, age: Duration) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.value.try_lock() {
                Ok(guard) => guard.as_ref().map_or(false, |c| c.fetched_at.elapsed() <= age),
                Err(_) => true,
            }
        });
        before - slots.len()
    }
}
