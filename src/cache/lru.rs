//! Recency-ordered entry store.
//!
//! Recency is tracked with a queue of `(key, tick)` stamps. Touching an entry
//! pushes a fresh stamp and leaves the old one behind; stale stamps are
//! skipped on eviction and compacted away once they outnumber live entries,
//! keeping every operation O(1) amortized.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use ahash::AHashMap;

use crate::cache::key::CacheKey;
use crate::metrics::result::AnalysisResult;

/// A cached result with its timestamps.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The shared result.
    pub result: Arc<AnalysisResult>,

    /// When the entry was inserted; TTL counts from here.
    pub inserted_at: Instant,

    /// When the entry was last read or written.
    pub last_access: Instant,

    tick: u64,
}

#[derive(Debug, Default)]
pub(crate) struct LruStore {
    entries: AHashMap<CacheKey, CacheEntry>,
    order: VecDeque<(CacheKey, u64)>,
    tick: u64,
}

impl LruStore {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Mark `key` as most recently used.
    pub(crate) fn touch(&mut self, key: &CacheKey, now: Instant) {
        let tick = self.next_tick();
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_access = now;
            entry.tick = tick;
            self.order.push_back((*key, tick));
            self.maybe_compact();
        }
    }

    /// Insert or replace `key`. Replacing restarts the TTL.
    pub(crate) fn insert(&mut self, key: CacheKey, result: Arc<AnalysisResult>, now: Instant) {
        let tick = self.next_tick();
        self.entries.insert(
            key,
            CacheEntry {
                result,
                inserted_at: now,
                last_access: now,
                tick,
            },
        );
        self.order.push_back((key, tick));
        self.maybe_compact();
    }

    pub(crate) fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    /// Remove and return the least recently used key.
    pub(crate) fn pop_lru(&mut self) -> Option<CacheKey> {
        while let Some((key, tick)) = self.order.pop_front() {
            let live = self.entries.get(&key).is_some_and(|e| e.tick == tick);
            if live {
                self.entries.remove(&key);
                return Some(key);
            }
        }
        None
    }

    /// Remove every entry inserted at or before `cutoff`; returns how many.
    pub(crate) fn remove_inserted_before(&mut self, cutoff: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.inserted_at > cutoff);
        before - self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn maybe_compact(&mut self) {
        if self.order.len() > 2 * self.entries.len() + 32 {
            let entries = &self.entries;
            self.order
                .retain(|(key, tick)| entries.get(key).is_some_and(|e| e.tick == *tick));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::analysis::token::TokenizationResult;
    use crate::document::Document;
    use crate::metrics::result::Timing;

    fn result() -> Arc<AnalysisResult> {
        let now = chrono::Utc::now();
        Arc::new(AnalysisResult {
            document: Arc::new(Document::new("d", "")),
            tokenizer: "t".to_string(),
            tokenization: TokenizationResult::new("t", Vec::new()),
            metrics: BTreeMap::new(),
            rolling_entropy: None,
            timing: Timing {
                started_at: now,
                finished_at: now,
                duration: std::time::Duration::ZERO,
            },
        })
    }

    fn key(n: u8) -> CacheKey {
        CacheKey::new(&n.to_string(), "t", &BTreeMap::new())
    }

    #[test]
    fn test_pop_lru_respects_touch() {
        let now = Instant::now();
        let mut store = LruStore::default();
        store.insert(key(1), result(), now);
        store.insert(key(2), result(), now);
        store.touch(&key(1), now);

        assert_eq!(store.pop_lru(), Some(key(2)));
        assert_eq!(store.pop_lru(), Some(key(1)));
        assert_eq!(store.pop_lru(), None);
    }

    #[test]
    fn test_compaction_keeps_order_bounded() {
        let now = Instant::now();
        let mut store = LruStore::default();
        store.insert(key(1), result(), now);
        for _ in 0..1000 {
            store.touch(&key(1), now);
        }
        assert!(store.order.len() <= 2 * store.len() + 33);
        assert_eq!(store.pop_lru(), Some(key(1)));
    }
}
