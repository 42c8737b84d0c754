// =============================================================================
// Warm cache — TTL and capacity bounded full-series tier
// =============================================================================
//
// Holds complete series for a handful of keys between the hot cache and the
// durable store. Entries expire a fixed interval after they were written
// (touching an entry does not extend its life) and the cache keeps at most
// `capacity` keys; inserting beyond that evicts the least recently touched
// entry. A miss here is normal, callers fall through to the cold store.
// =============================================================================

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::types::{Candle, SeriesKey};

struct WarmEntry {
    series: Vec<Candle>,
    written_at: Instant,
    touched_at: Instant,
}

pub struct WarmCache {
    entries: RwLock<HashMap<SeriesKey, WarmEntry>>,
    capacity: usize,
    ttl: Duration,
}

impl WarmCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Return the cached series for `key` if present and not expired.
    /// A hit refreshes the entry's eviction recency, not its TTL.
    pub fn get(&self, key: &SeriesKey) -> Option<Vec<Candle>> {
        let mut map = self.entries.write();
        match map.get_mut(key) {
            Some(entry) if entry.written_at.elapsed() <= self.ttl => {
                entry.touched_at = Instant::now();
                Some(entry.series.clone())
            }
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    /// Install `series` for `key`, evicting expired entries first and then
    /// the least recently touched entry while over capacity.
    pub fn put(&self, key: SeriesKey, series: Vec<Candle>) {
        let now = Instant::now();
        let mut map = self.entries.write();

        map.retain(|_, entry| entry.written_at.elapsed() <= self.ttl);

        map.insert(
            key,
            WarmEntry {
                series,
                written_at: now,
                touched_at: now,
            },
        );

        while map.len() > self.capacity {
            let victim = map
                .iter()
                .min_by_key(|(_, entry)| entry.touched_at)
                .map(|(key, _)| key.clone());
            match victim {
                Some(key) => {
                    map.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn invalidate(&self, key: &SeriesKey) {
        self.entries.write().remove(key);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timeframe;

    fn series(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle {
                symbol: "BTC".into(),
                timestamp: i as i64 * 1000,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 1.0,
            })
            .collect()
    }

    fn key(symbol: &str) -> SeriesKey {
        SeriesKey::new(symbol, Timeframe::Hour1)
    }

    #[test]
    fn put_then_get_returns_the_series() {
        let cache = WarmCache::new(5, Duration::from_secs(600));
        cache.put(key("BTC"), series(100));

        let hit = cache.get(&key("BTC")).expect("should hit");
        assert_eq!(hit.len(), 100);
    }

    #[test]
    fn entries_expire_after_the_ttl() {
        let cache = WarmCache::new(5, Duration::from_millis(5));
        cache.put(key("BTC"), series(10));

        std::thread::sleep(Duration::from_millis(15));
        assert!(cache.get(&key("BTC")).is_none());
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn touching_does_not_extend_the_ttl() {
        let cache = WarmCache::new(5, Duration::from_millis(200));
        cache.put(key("BTC"), series(10));

        std::thread::sleep(Duration::from_millis(120));
        assert!(cache.get(&key("BTC")).is_some());

        std::thread::sleep(Duration::from_millis(120));
        // Past the write TTL even though the entry was touched in between.
        assert!(cache.get(&key("BTC")).is_none());
    }

    #[test]
    fn capacity_evicts_the_least_recently_touched() {
        let cache = WarmCache::new(2, Duration::from_secs(600));
        cache.put(key("BTC"), series(1));
        cache.put(key("SOL"), series(2));

        // Touch BTC so SOL becomes the eviction victim.
        cache.get(&key("BTC"));
        cache.put(key("TAO"), series(3));

        assert_eq!(cache.entry_count(), 2);
        assert!(cache.get(&key("BTC")).is_some());
        assert!(cache.get(&key("SOL")).is_none());
        assert!(cache.get(&key("TAO")).is_some());
    }

    #[test]
    fn invalidate_removes_the_entry() {
        let cache = WarmCache::new(5, Duration::from_secs(600));
        cache.put(key("BTC"), series(10));
        cache.invalidate(&key("BTC"));
        assert!(cache.get(&key("BTC")).is_none());
    }

    #[test]
    fn reinserting_a_key_does_not_grow_the_cache() {
        let cache = WarmCache::new(5, Duration::from_secs(600));
        cache.put(key("BTC"), series(10));
        cache.put(key("BTC"), series(20));

        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.get(&key("BTC")).map(|s| s.len()), Some(20));
    }
}
