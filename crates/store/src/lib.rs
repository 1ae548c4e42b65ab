//! Lookout store: the details cache contract and an in-RAM TTL cache.

#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use metrics::counter;
use rustc_hash::FxHashMap;
use tokio::time::Instant;
use tracing::debug;

/// Keyed cache with per-entry time-to-live. Calls may be I/O bound, hence async.
#[async_trait::async_trait]
pub trait DetailsCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<serde_json::Value>;
    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration);
    async fn invalidate(&self, key: &str);
}

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

struct Inner {
    map: FxHashMap<String, Entry>,
    order: VecDeque<String>,
}

impl Inner {
    fn purge(&mut self, now: Instant) -> usize {
        let before = self.map.len();
        self.map.retain(|_, e| e.expires_at > now);
        let map = &self.map;
        self.order.retain(|k| map.contains_key(k));
        before - self.map.len()
    }
}

/// Longest lifetime an entry can get; larger requests are capped.
pub const MAX_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// In-memory cache with a fixed capacity; the oldest inserted key is evicted first.
///
/// Uses tokio's clock so tests can drive expiry with a paused runtime.
pub struct TtlCache {
    inner: Mutex<Inner>,
    cap: usize,
}

impl TtlCache {
    pub fn with_capacity(cap: usize) -> Self {
        Self { inner: Mutex::new(Inner { map: FxHashMap::default(), order: VecDeque::new() }), cap: cap.max(1) }
    }

    /// Capacity from `LOOKOUT_CACHE_CAP` (default 512).
    pub fn from_env() -> Self {
        let cap = std::env::var("LOOKOUT_CACHE_CAP").ok().and_then(|s| s.parse::<usize>().ok()).unwrap_or(512);
        Self::with_capacity(cap)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_sync(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;
        let expired = match inner.map.get(key) {
            Some(e) if e.expires_at > now => return Some(e.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.map.remove(key);
            inner.order.retain(|k| k != key);
            debug!(key = %key, "cache entry expired");
        }
        None
    }

    pub fn set_sync(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now);
        let mut guard = self.lock();
        let inner = &mut *guard;
        if !inner.map.contains_key(key) {
            // expired entries go before live ones are evicted
            if inner.order.len() >= self.cap && inner.purge(now) > 0 {
                debug!(len = inner.map.len(), "cache swept expired entries");
            }
            if inner.order.len() >= self.cap {
                if let Some(old) = inner.order.pop_front() {
                    inner.map.remove(&old);
                    counter!("details_cache_evictions_total", 1u64);
                }
            }
            inner.order.push_back(key.to_string());
        }
        inner.map.insert(key.to_string(), Entry { value, expires_at });
    }

    pub fn invalidate_sync(&self, key: &str) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.map.remove(key).is_some() {
            inner.order.retain(|k| k != key);
            debug!(key = %key, "cache entry invalidated");
        }
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::with_capacity(512)
    }
}

#[async_trait::async_trait]
impl DetailsCache for TtlCache {
    async fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.get_sync(key)
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        self.set_sync(key, value, ttl)
    }

    async fn invalidate(&self, key: &str) {
        self.invalidate_sync(key)
    }
}
