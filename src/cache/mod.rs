//! In-memory memo of analysis results.
//!
//! [`ResultCache`] maps a [`CacheKey`] to a shared [`AnalysisResult`]. It is
//! bounded by entry count (least recently used entries are evicted first) and
//! by age (entries expire a fixed TTL after insertion). Expired entries are
//! never returned, and a background thread sweeps them out periodically.
//!
//! ```
//! use tokdrift::cache::{CacheConfig, ResultCache};
//!
//! let cache = ResultCache::new(CacheConfig::default()).unwrap();
//! assert_eq!(cache.stats().size, 0);
//! cache.close();
//! ```

pub mod clock;
pub mod config;
pub mod key;
mod lru;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metrics::result::AnalysisResult;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use key::CacheKey;
pub use lru::CacheEntry;

use lru::LruStore;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups that returned an entry.
    pub hits: u64,

    /// Lookups that returned nothing (including expired entries).
    pub misses: u64,

    /// Entries removed to make room.
    pub evictions: u64,

    /// Entries removed because their TTL passed.
    pub expirations: u64,

    /// Current number of entries.
    pub size: usize,
}

impl CacheStats {
    /// Hits divided by lookups; 0 when there were no lookups.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

struct Shared {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    store: Mutex<LruStore>,
    counters: Counters,
}

impl Shared {
    fn record(&self, counter: &AtomicU64, n: u64) {
        if self.config.enable_stats && n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    fn sweep(&self) -> usize {
        let now = self.clock.now();
        let Some(cutoff) = now.checked_sub(self.config.ttl) else {
            return 0;
        };
        let removed = self.store.lock().remove_inserted_before(cutoff);
        self.record(&self.counters.expirations, removed as u64);
        removed
    }
}

struct Sweeper {
    shutdown: Sender<()>,
    handle: thread::JoinHandle<()>,
}

/// Thread-safe LRU + TTL cache of analysis results.
pub struct ResultCache {
    shared: Arc<Shared>,
    sweeper: Mutex<Option<Sweeper>>,
    closed: AtomicBool,
}

impl ResultCache {
    /// Create a cache on the system clock.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`.
    ///
    /// A background sweep thread is started unless the cache is disabled.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            config,
            clock,
            store: Mutex::new(LruStore::default()),
            counters: Counters::default(),
        });

        let sweeper = if shared.config.enabled {
            Some(Self::spawn_sweeper(Arc::clone(&shared))?)
        } else {
            None
        };

        Ok(Self {
            shared,
            sweeper: Mutex::new(sweeper),
            closed: AtomicBool::new(false),
        })
    }

    fn spawn_sweeper(shared: Arc<Shared>) -> Result<Sweeper> {
        let (shutdown, signal) = bounded::<()>(1);
        let interval = shared.config.cleanup_interval;

        let handle = thread::Builder::new()
            .name("tokdrift-cache-sweeper".to_string())
            .spawn(move || {
                loop {
                    match signal.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let removed = shared.sweep();
                            if removed > 0 {
                                log::debug!("cache sweep removed {removed} expired entries");
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        Ok(Sweeper { shutdown, handle })
    }

    fn active(&self) -> bool {
        self.shared.config.enabled && !self.closed.load(Ordering::Acquire)
    }

    /// Configuration in effect.
    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    /// Look up `key`, refreshing its recency on a hit.
    ///
    /// An entry past its TTL is removed and reported as a miss, whether or not
    /// the sweeper has run.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<AnalysisResult>> {
        if !self.active() {
            return None;
        }

        let shared = &self.shared;
        let now = shared.clock.now();
        let mut store = shared.store.lock();

        let Some(inserted_at) = store.get(key).map(|entry| entry.inserted_at) else {
            drop(store);
            shared.record(&shared.counters.misses, 1);
            return None;
        };

        if now.saturating_duration_since(inserted_at) >= shared.config.ttl {
            store.remove(key);
            drop(store);
            shared.record(&shared.counters.expirations, 1);
            shared.record(&shared.counters.misses, 1);
            return None;
        }

        store.touch(key, now);
        let result = store.get(key).map(|entry| Arc::clone(&entry.result));
        drop(store);
        shared.record(&shared.counters.hits, 1);
        result
    }

    /// Insert `result` under `key`, evicting the least recently used entry if
    /// the cache is full.
    pub fn put(&self, key: CacheKey, result: Arc<AnalysisResult>) {
        if !self.active() {
            return;
        }

        let shared = &self.shared;
        let now = shared.clock.now();
        let mut evicted = 0u64;
        {
            let mut store = shared.store.lock();
            if store.get(&key).is_none() {
                while store.len() >= shared.config.max_size {
                    match store.pop_lru() {
                        Some(victim) => {
                            log::debug!("cache evicted {victim:?}");
                            evicted += 1;
                        }
                        None => break,
                    }
                }
            }
            store.insert(key, result, now);
        }
        shared.record(&shared.counters.evictions, evicted);
    }

    /// Remove `key` if present.
    pub fn remove(&self, key: &CacheKey) -> Option<Arc<AnalysisResult>> {
        self.shared.store.lock().remove(key).map(|entry| entry.result)
    }

    /// Whether a live entry exists for `key`. Does not touch counters or
    /// recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        if !self.active() {
            return false;
        }
        let now = self.shared.clock.now();
        self.shared
            .store
            .lock()
            .get(key)
            .is_some_and(|e| now.saturating_duration_since(e.inserted_at) < self.shared.config.ttl)
    }

    /// Number of entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.shared.store.lock().len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove expired entries now; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.shared.sweep()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        let counters = &self.shared.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            expirations: counters.expirations.load(Ordering::Relaxed),
            size: self.len(),
        }
    }

    /// Remove every entry. Counters are kept.
    pub fn clear(&self) {
        self.shared.store.lock().clear();
    }

    /// Stop the sweeper and release all entries. Idempotent; afterwards the
    /// cache behaves as disabled.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(sweeper) = self.sweeper.lock().take() {
            let _ = sweeper.shutdown.send(());
            if sweeper.handle.join().is_err() {
                log::warn!("cache sweeper thread panicked");
            }
        }
        self.clear();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for ResultCache {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use crate::analysis::token::TokenizationResult;
    use crate::document::Document;
    use crate::metrics::result::Timing;

    fn result(id: &str) -> Arc<AnalysisResult> {
        let now = chrono::Utc::now();
        Arc::new(AnalysisResult {
            document: Arc::new(Document::new(id, id)),
            tokenizer: "t".to_string(),
            tokenization: TokenizationResult::new("t", Vec::new()),
            metrics: BTreeMap::new(),
            rolling_entropy: None,
            timing: Timing {
                started_at: now,
                finished_at: now,
                duration: Duration::ZERO,
            },
        })
    }

    fn key(text: &str) -> CacheKey {
        CacheKey::new(text, "t", &BTreeMap::new())
    }

    fn manual_cache(config: CacheConfig) -> (ResultCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = ResultCache::with_clock(config, clock.clone()).unwrap();
        (cache, clock)
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let (cache, _) = manual_cache(CacheConfig::default());
        assert!(cache.get(&key("a")).is_none());

        cache.put(key("a"), result("a"));
        let hit = cache.get(&key("a")).unwrap();
        assert_eq!(hit.document_id(), "a");

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
        assert!((stats.hit_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_ttl_expiry_without_sweep() {
        let config = CacheConfig::default()
            .with_ttl(Duration::from_secs(10))
            .with_cleanup_interval(Duration::from_secs(3600));
        let (cache, clock) = manual_cache(config);

        cache.put(key("a"), result("a"));
        clock.advance(Duration::from_secs(9));
        assert!(cache.get(&key("a")).is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get(&key("a")).is_none());
        assert_eq!(cache.stats().expirations, 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_access_does_not_extend_ttl() {
        let config = CacheConfig::default().with_ttl(Duration::from_secs(10));
        let (cache, clock) = manual_cache(config);

        cache.put(key("a"), result("a"));
        for _ in 0..3 {
            clock.advance(Duration::from_secs(4));
            let _ = cache.get(&key("a"));
        }
        assert!(!cache.contains(&key("a")));
    }

    #[test]
    fn test_lru_eviction() {
        let (cache, _) = manual_cache(CacheConfig::default().with_max_size(2));
        cache.put(key("a"), result("a"));
        cache.put(key("b"), result("b"));
        assert!(cache.get(&key("a")).is_some());

        cache.put(key("c"), result("c"));
        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
        assert!(cache.contains(&key("c")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_replacing_does_not_evict() {
        let (cache, _) = manual_cache(CacheConfig::default().with_max_size(1));
        cache.put(key("a"), result("a"));
        cache.put(key("a"), result("a"));
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_manual_sweep() {
        let (cache, clock) = manual_cache(CacheConfig::default().with_ttl(Duration::from_secs(5)));
        cache.put(key("a"), result("a"));
        cache.put(key("b"), result("b"));
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.sweep_expired(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expirations, 2);
    }

    #[test]
    fn test_background_sweeper_runs() {
        let config = CacheConfig::default()
            .with_ttl(Duration::from_millis(10))
            .with_cleanup_interval(Duration::from_millis(20));
        let cache = ResultCache::new(config).unwrap();
        cache.put(key("a"), result("a"));

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while cache.len() > 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(cache.len(), 0);
        cache.close();
    }

    #[test]
    fn test_disabled_cache() {
        let (cache, _) = manual_cache(CacheConfig::disabled());
        cache.put(key("a"), result("a"));
        assert!(cache.get(&key("a")).is_none());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_stats_disabled_still_reports_size() {
        let (cache, _) = manual_cache(CacheConfig::default().with_stats(false));
        cache.put(key("a"), result("a"));
        let _ = cache.get(&key("a"));
        let _ = cache.get(&key("b"));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (0, 0));
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let cache = ResultCache::new(CacheConfig::default()).unwrap();
        cache.put(key("a"), result("a"));
        cache.close();
        cache.close();
        assert!(cache.is_closed());
        assert!(cache.get(&key("a")).is_none());
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(ResultCache::new(CacheConfig::default().with_max_size(64)).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        let k = key(&format!("{t}-{}", i % 80));
                        if cache.get(&k).is_none() {
                            cache.put(k, result("x"));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 64);
    }
}
