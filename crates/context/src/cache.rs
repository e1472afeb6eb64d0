//! The summary cache — TTL entries keyed by version-embedding fingerprints,
//! with per-key single-flight coordination.
//!
//! Invalidation is lazy: the store's per-scope version counter is part of
//! the fingerprint, so a summary computed against a stale version can never
//! be looked up again once the scope advances. A background reaper bounds
//! memory by sweeping entries past their TTL. Entries are replaced
//! wholesale, never patched.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, trace};

use crate::clock::Clock;

/// Fingerprint for one (scope, query, store-version) triple.
pub fn fingerprint(scope: &str, query: &str, version: u64) -> String {
    let normalized: String = query.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    hasher.update([0u8]);
    hasher.update(normalized.as_bytes());
    hasher.update([0u8]);
    hasher.update(version.to_le_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

struct Entry {
    summary: Arc<str>,
    inserted_at: Instant,
}

/// TTL cache for pre-computed context summaries.
pub struct SummaryCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, Entry>>,
    inflight: Mutex<HashMap<String, watch::Receiver<Option<Arc<str>>>>>,
}

impl SummaryCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a live entry. Expired entries are treated as absent (the
    /// reaper removes them physically).
    pub async fn get(&self, key: &str) -> Option<Arc<str>> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if self.clock.now().duration_since(entry.inserted_at) >= self.ttl {
            trace!(key, "cache entry expired");
            return None;
        }
        Some(entry.summary.clone())
    }

    /// Get the summary for `key`, computing it at most once across
    /// concurrent callers (single-flight): the first caller runs `compute`,
    /// the rest wait on the in-flight result.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Arc<str>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = String>,
    {
        if let Some(summary) = self.get(key).await {
            return summary;
        }

        // Join the in-flight computation for this key, or claim it.
        enum Flight {
            Publish(watch::Sender<Option<Arc<str>>>),
            Wait(watch::Receiver<Option<Arc<str>>>),
        }

        let flight = {
            let mut inflight = self.inflight.lock().await;
            if let Some(rx) = inflight.get(key) {
                Flight::Wait(rx.clone())
            } else {
                let (tx, rx) = watch::channel(None);
                inflight.insert(key.to_string(), rx);
                Flight::Publish(tx)
            }
        };

        match flight {
            Flight::Publish(tx) => {
                let summary = self.compute_and_store(key, compute).await;
                let _ = tx.send(Some(summary.clone()));
                self.inflight.lock().await.remove(key);
                debug!(key, "summary computed and cached");
                summary
            }
            Flight::Wait(mut rx) => {
                loop {
                    if let Some(summary) = rx.borrow_and_update().clone() {
                        return summary;
                    }
                    if rx.changed().await.is_err() {
                        // The publisher vanished without a value; compute
                        // directly rather than hang.
                        return self.compute_and_store(key, compute).await;
                    }
                }
            }
        }
    }

    async fn compute_and_store<F, Fut>(&self, key: &str, compute: F) -> Arc<str>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = String>,
    {
        let summary: Arc<str> = compute().await.into();
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                summary: summary.clone(),
                inserted_at: self.clock.now(),
            },
        );
        summary
    }

    /// Number of entries currently held (expired included, until reaped).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Remove every entry past its TTL.
    pub async fn reap(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.inserted_at) < self.ttl);
        before - entries.len()
    }

    /// Spawn the background reaper. Dropping the handle aborts nothing;
    /// call `abort()` on shutdown.
    pub fn start_reaper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let removed = cache.reap().await;
                if removed > 0 {
                    debug!(removed, "reaped expired summaries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache_with_clock(ttl_secs: u64) -> (Arc<SummaryCache>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(SummaryCache::new(
            Duration::from_secs(ttl_secs),
            clock.clone(),
        ));
        (cache, clock)
    }

    #[test]
    fn fingerprint_embeds_version() {
        let a = fingerprint("alex", "what is my name", 1);
        let b = fingerprint("alex", "what is my name", 2);
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_normalizes_query() {
        let a = fingerprint("alex", "What   Is My Name", 1);
        let b = fingerprint("alex", "what is my name", 1);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn compute_then_hit() {
        let (cache, _clock) = cache_with_clock(60);
        let summary = cache.get_or_compute("k1", || async { "facts".to_string() }).await;
        assert_eq!(&*summary, "facts");

        // Second lookup must not recompute.
        let summary = cache
            .get_or_compute("k1", || async { panic!("should have hit the cache") })
            .await;
        assert_eq!(&*summary, "facts");
    }

    #[tokio::test]
    async fn expired_entry_is_not_served() {
        let (cache, clock) = cache_with_clock(60);
        cache.get_or_compute("k1", || async { "old".to_string() }).await;

        clock.advance(Duration::from_secs(61));
        assert!(cache.get("k1").await.is_none());

        let summary = cache.get_or_compute("k1", || async { "new".to_string() }).await;
        assert_eq!(&*summary, "new");
    }

    #[tokio::test]
    async fn single_flight_computes_once() {
        let (cache, _clock) = cache_with_clock(60);
        let computations = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let computations = computations.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("shared", move || async move {
                        computations.fetch_add(1, Ordering::SeqCst);
                        // Hold the flight open long enough for all callers
                        // to pile onto it.
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        "summary".to_string()
                    })
                    .await
            }));
        }

        for handle in handles {
            let summary = handle.await.unwrap();
            assert_eq!(&*summary, "summary");
        }
        assert_eq!(computations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reap_removes_only_expired() {
        let (cache, clock) = cache_with_clock(60);
        cache.get_or_compute("old", || async { "a".to_string() }).await;

        clock.advance(Duration::from_secs(40));
        cache.get_or_compute("young", || async { "b".to_string() }).await;

        clock.advance(Duration::from_secs(30)); // old: 70s, young: 30s
        let removed = cache.reap().await;
        assert_eq!(removed, 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("young").await.is_some());
    }

    #[tokio::test]
    async fn background_reaper_sweeps() {
        let (cache, clock) = cache_with_clock(1);
        cache.get_or_compute("k", || async { "v".to_string() }).await;
        clock.advance(Duration::from_secs(2));

        let handle = cache.start_reaper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(cache.len().await, 0);
    }
}
