//! Coordinate-keyed LRU+TTL segment cache (spec §4.7, §6).
//!
//! Key = `"{lat3},{lng3}:{lat3},{lng3}"` with 3-decimal rounding (~100 m),
//! a persisted wire contract (spec §6). Capacity and TTL are process-wide
//! knobs (`PlannerConfig`). Grounded on `lru` usage in the pack's
//! `nicolasavru-kayaknav` example; the teacher has no cache of its own.

use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;

use crate::model::{LatLng, SegmentCost};

#[derive(Debug, Clone)]
struct Entry {
    cost: SegmentCost,
    inserted_at: Instant,
}

/// Process-wide (or per-client, for test isolation) segment cache.
pub struct SegmentCache {
    inner: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl SegmentCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Cache key for a coordinate pair (spec §6: 3-decimal rounding).
    pub fn key(from: LatLng, to: LatLng) -> String {
        format!(
            "{:.3},{:.3}:{:.3},{:.3}",
            from.lat, from.lng, to.lat, to.lng
        )
    }

    /// Returns a copy of the cached cost if present and unexpired. The
    /// returned `SegmentCost.key` is left untouched — callers rewrite it to
    /// their own `SegmentKey` (spec §4.7 "cache hits produce a copy whose
    /// `SegmentKey` is rewritten to the caller's key").
    pub async fn get(&self, from: LatLng, to: LatLng) -> Option<SegmentCost> {
        let key = Self::key(from, to);
        let mut guard = self.inner.lock().await;
        match guard.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => Some(entry.cost.clone()),
            Some(_) => {
                guard.pop(&key);
                debug!(%key, "cache: entry expired");
                None
            }
            None => None,
        }
    }

    pub async fn insert(&self, from: LatLng, to: LatLng, cost: SegmentCost) {
        let key = Self::key(from, to);
        let mut guard = self.inner.lock().await;
        guard.put(
            key,
            Entry {
                cost,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Removes every expired entry. Intended to run on a periodic sweep
    /// (spec §4.7: "a TTL sweep runs every 10 min").
    pub async fn sweep(&self) {
        let mut guard = self.inner.lock().await;
        let ttl = self.ttl;
        let expired_keys: Vec<String> = guard
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() > ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired_keys {
            guard.pop(&key);
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

/// Spawns a background task that periodically sweeps expired entries.
/// Returns its [`tokio::task::JoinHandle`] so callers/tests can abort it.
pub fn spawn_sweeper(cache: std::sync::Arc<SegmentCache>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            cache.sweep().await;
        }
    })
}
