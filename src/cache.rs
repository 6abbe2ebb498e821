//! Cache-aside store for remote responses that stay valid for a long,
//! externally decided period (the manifest, daily vendor rotations).
//!
//! [`ResponseCache::get_or_fetch`] returns the stored value for a key or
//! runs the fetch, storing its result only on success. Failures are never
//! cached, so the next call for the same key fetches again.
//!
//! # Expiry
//!
//! | Policy | Behavior |
//! |--------|----------|
//! | [`CachePolicy::Never`] | Entries live until invalidated or the process exits |
//! | [`CachePolicy::Ttl`] | Entries older than the TTL are treated as absent |
//!
//! Independently of the policy, [`invalidate`](ResponseCache::invalidate)
//! drops one key and [`clear`](ResponseCache::clear) drops everything;
//! manifest synchronization uses the latter.
//!
//! # Hit completion
//!
//! A hit never completes on the first poll: it yields to the scheduler
//! (or sleeps for the configured hit delay) so hit and miss paths look
//! the same to callers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::CacheConfig;

/// Expiry rule applied on lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    #[default]
    Never,
    Ttl(Duration),
}

impl CachePolicy {
    fn is_fresh(&self, stored_at: Instant) -> bool {
        match self {
            CachePolicy::Never => true,
            CachePolicy::Ttl(ttl) => stored_at.elapsed() < *ttl,
        }
    }
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Keyed in-memory response cache, shared by reference across tasks.
pub struct ResponseCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    policy: CachePolicy,
    hit_delay: Duration,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            policy,
            hit_delay: Duration::ZERO,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let policy = match config.ttl_secs {
            Some(secs) => CachePolicy::Ttl(Duration::from_secs(secs)),
            None => CachePolicy::Never,
        };
        Self::new(policy).with_hit_delay(Duration::from_millis(config.hit_delay_ms))
    }

    pub fn with_hit_delay(mut self, delay: Duration) -> Self {
        self.hit_delay = delay;
        self
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    // Every write is a single HashMap call; a poisoned lock is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the cached value for `key`, or run `fetch` and cache its
    /// successful result.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            debug!(key, "cache hit");
            self.settle().await;
            return Ok(value);
        }

        debug!(key, "cache miss");
        let value = fetch().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Synchronous peek; expired entries read as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.read();
        entries
            .get(key)
            .filter(|entry| self.policy.is_fresh(entry.stored_at))
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: &str, value: V) {
        self.write().insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.write().remove(key).is_some();
        if removed {
            debug!(key, "cache entry invalidated");
        }
        removed
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.write();
        let count = entries.len();
        entries.clear();
        debug!(count, "cache cleared");
        count
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn settle(&self) {
        if self.hit_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.hit_delay).await;
        }
    }
}
