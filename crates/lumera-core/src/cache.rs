//! Read-through response cache with per-entry TTL and single-flight misses.
//!
//! All derived content served by the gateway flows through this cache. A
//! miss runs the supplied compute function (typically a network call) and
//! stores the result under the entry's TTL; concurrent misses for the same
//! key are coalesced so only one compute runs. Failures are never cached.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::Result;

/// Structured cache key: an operation tag plus normalized parameters.
///
/// Two logically-identical requests must render to the same key, so id sets
/// are deduplicated and sorted (ordinal comparison) before they enter the
/// key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    op: &'static str,
    params: Vec<String>,
}

impl CacheKey {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            params: Vec::new(),
        }
    }

    pub fn push(mut self, param: impl fmt::Display) -> Self {
        self.params.push(param.to_string());
        self
    }

    /// Appends an optional parameter; `None` renders as `-` so that absent
    /// and empty values stay distinguishable from each other.
    pub fn push_opt(mut self, param: Option<impl fmt::Display>) -> Self {
        self.params.push(match param {
            Some(p) => p.to_string(),
            None => "-".to_string(),
        });
        self
    }

    /// Appends an id set as a single deduplicated, ordinally-sorted parameter.
    pub fn push_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids: Vec<String> = ids.into_iter().map(|s| s.as_ref().to_owned()).collect();
        ids.sort_unstable();
        ids.dedup();
        self.params.push(ids.join(","));
        self
    }

    pub fn render(&self) -> String {
        let mut out = self.op.to_string();
        for p in &self.params {
            out.push(':');
            out.push_str(p);
        }
        out
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// A cached entry with TTL support.
///
/// The value is wrapped in `Arc` so a hit clones cheaply; callers receive an
/// owned `Value` cloned out of the `Arc`, which keeps cached state immune to
/// downstream mutation.
#[derive(Clone, Debug)]
struct CachedEntry {
    value: Arc<Value>,
    cached_at: Instant,
    ttl: Duration,
}

impl CachedEntry {
    fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value: Arc::new(value),
            cached_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// In-memory read-through cache shared by every upstream integration.
///
/// Concurrent misses for the same key serialize on a per-key async mutex
/// with a double-checked read, so exactly one compute runs per cold key. A
/// failed compute releases the key without populating it; the next caller
/// simply retries.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<String, CachedEntry>,
    key_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a key, returning an owned clone of the stored value.
    /// Expired entries are evicted on the way out.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.value.as_ref().clone()),
            Some(entry) => {
                drop(entry);
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        self.entries.insert(key.into(), CachedEntry::new(value, ttl));
    }

    /// Read-through lookup: returns the cached value on a hit, otherwise
    /// runs `compute`, stores its result under `ttl` and returns it.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let key = key.render();
        if let Some(hit) = self.get(&key) {
            tracing::trace!(key = %key, "cache hit");
            return Ok(hit);
        }

        let lock = self
            .key_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;

        // The flight leader may have populated the entry while we waited.
        if let Some(hit) = self.get(&key) {
            tracing::trace!(key = %key, "cache hit after coalesced miss");
            drop(guard);
            drop(lock);
            self.release_key_lock(&key);
            return Ok(hit);
        }

        tracing::debug!(key = %key, "cache miss");
        let value = compute().await?;
        self.insert(key.clone(), value.clone(), ttl);

        drop(guard);
        drop(lock);
        self.release_key_lock(&key);

        Ok(value)
    }

    /// Drops a key's miss lock once no other waiter holds it.
    fn release_key_lock(&self, key: &str) {
        self.key_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Drops every entry. This is the only invalidation path; there is no
    /// targeted eviction.
    pub fn clear(&self) {
        let dropped = self.entries.len();
        self.entries.clear();
        tracing::info!(dropped, "response cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
