// src/cache.rs
//! Per-adapter query cache.
//!
//! Entries live until the next full clear; there is no per-entry TTL and no
//! eviction. A background ticker clears everything on a fixed period for as
//! long as the cache is alive. Cold misses for the same key are serialised so
//! two identical concurrent searches cost one scrape.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::listing::{Listing, Query};

pub const DEFAULT_CLEAR_INTERVAL: Duration = Duration::from_secs(3600);

/// Whether a result came from the cache or from a fresh acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_header(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

#[derive(Debug)]
pub struct QueryCache {
    source: &'static str,
    entries: Mutex<HashMap<String, Vec<Listing>>>,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    last_cleared: Mutex<DateTime<Utc>>,
}

impl QueryCache {
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            last_cleared: Mutex::new(Utc::now()),
        }
    }

    pub fn get(&self, query: &Query) -> Option<Vec<Listing>> {
        let entries = self.entries.lock().expect("query cache mutex poisoned");
        entries.get(query.as_str()).cloned()
    }

    pub fn set(&self, query: &Query, listings: Vec<Listing>) {
        let mut entries = self.entries.lock().expect("query cache mutex poisoned");
        entries.insert(query.as_str().to_string(), listings);
    }

    pub fn clear_all(&self) {
        let dropped = {
            let mut entries = self.entries.lock().expect("query cache mutex poisoned");
            let n = entries.len();
            entries.clear();
            n
        };
        *self.last_cleared.lock().expect("query cache mutex poisoned") = Utc::now();
        counter!("scrape_cache_clears_total", "source" => self.source).increment(1);
        info!(target: "cache", source = self.source, dropped, "clearing the cache");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("query cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_cleared(&self) -> DateTime<Utc> {
        *self.last_cleared.lock().expect("query cache mutex poisoned")
    }

    /// Return the cached listings for `query`, or run `acquire` and store
    /// its result. Failed acquisitions are not stored.
    pub async fn get_or_acquire<F, Fut>(
        &self,
        query: &Query,
        acquire: F,
    ) -> anyhow::Result<(Vec<Listing>, CacheStatus)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<Listing>>>,
    {
        if let Some(hit) = self.get(query) {
            return Ok(self.hit(query, hit));
        }

        let lease = self.lease_gate(query);
        let _held = lease.gate.lock().await;
        match self.get(query) {
            // Another request for the same key finished while we waited.
            Some(hit) => Ok(self.hit(query, hit)),
            None => {
                counter!("scrape_cache_misses_total", "source" => self.source).increment(1);
                acquire().await.map(|listings| {
                    self.set(query, listings.clone());
                    (listings, CacheStatus::Miss)
                })
            }
        }
    }

    fn hit(&self, query: &Query, listings: Vec<Listing>) -> (Vec<Listing>, CacheStatus) {
        counter!("scrape_cache_hits_total", "source" => self.source).increment(1);
        debug!(target: "cache", source = self.source, %query, "query match in cache");
        (listings, CacheStatus::Hit)
    }

    fn lease_gate(&self, query: &Query) -> GateLease<'_> {
        let mut gates = self.gates.lock().expect("query cache mutex poisoned");
        let gate = gates
            .entry(query.as_str().to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        GateLease {
            cache: self,
            key: query.as_str().to_string(),
            gate,
        }
    }

    /// Clear the cache every `period` until the cache itself is dropped.
    pub fn spawn_periodic_clear(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.clear_all();
            }
        })
    }
}

/// Holds a per-key gate; dropping it (also when the acquiring future is
/// cancelled) removes the gate once no other request is waiting on it.
struct GateLease<'a> {
    cache: &'a QueryCache,
    key: String,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for GateLease<'_> {
    fn drop(&mut self) {
        let Ok(mut gates) = self.cache.gates.lock() else {
            return;
        };
        // map + ours: nobody else is waiting on this key
        if Arc::strong_count(&self.gate) == 2 {
            gates.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn q(s: &str) -> Query {
        Query::parse(Some(s)).unwrap()
    }

    fn one(title: &str) -> Vec<Listing> {
        vec![Listing::new(title, "https://x.test/1", Some("$1".into()), "test")]
    }

    #[test]
    fn set_get_and_clear() {
        let cache = QueryCache::new("test");
        assert!(cache.get(&q("hd600")).is_none());
        cache.set(&q("hd600"), one("a"));
        assert_eq!(cache.get(&q("hd600")), Some(one("a")));
        assert!(cache.get(&q("HD600")).is_none(), "keys are case sensitive");
        cache.clear_all();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn miss_then_hit_returns_first_result() {
        let cache = QueryCache::new("test");
        let calls = AtomicUsize::new(0);

        let (first, s1) = cache
            .get_or_acquire(&q("hd600"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(one("first"))
            })
            .await
            .unwrap();
        let (second, s2) = cache
            .get_or_acquire(&q("hd600"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(one("second"))
            })
            .await
            .unwrap();

        assert_eq!(s1, CacheStatus::Miss);
        assert_eq!(s2, CacheStatus::Hit);
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = QueryCache::new("test");
        let err = cache
            .get_or_acquire(&q("hd600"), || async { anyhow::bail!("boom") })
            .await;
        assert!(err.is_err());
        assert!(cache.get(&q("hd600")).is_none());
        assert!(cache.gates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_misses_leave_no_gates() {
        let cache = QueryCache::new("test");
        for i in 0..100 {
            let res = tokio::time::timeout(
                Duration::from_millis(1),
                cache.get_or_acquire(&q(&format!("q{i}")), || async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(one("never"))
                }),
            )
            .await;
            assert!(res.is_err(), "acquire should have been cancelled");
        }
        assert!(cache.gates.lock().unwrap().is_empty());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn concurrent_identical_misses_acquire_once() {
        let cache = Arc::new(QueryCache::new("test"));
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |cache: Arc<QueryCache>, calls: Arc<AtomicUsize>| async move {
            cache
                .get_or_acquire(&q("hd600"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(one("slow"))
                })
                .await
                .unwrap()
        };

        let (a, b) = tokio::join!(
            run(cache.clone(), calls.clone()),
            run(cache.clone(), calls.clone())
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.0, b.0);
        let mut statuses = vec![a.1, b.1];
        statuses.sort_by_key(|s| s.as_header());
        assert_eq!(statuses, vec![CacheStatus::Hit, CacheStatus::Miss]);
    }

    #[tokio::test]
    async fn periodic_clear_empties_cache() {
        let cache = Arc::new(QueryCache::new("test"));
        cache.set(&q("hd600"), one("a"));
        let before = cache.last_cleared();

        let task = cache.spawn_periodic_clear(Duration::from_millis(40));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(cache.is_empty());
        assert!(cache.last_cleared() > before);
        task.abort();
    }
}
