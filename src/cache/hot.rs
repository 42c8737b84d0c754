// =============================================================================
// Hot cache — trailing slice of the most recent points per key
// =============================================================================
//
// Fastest tier, consulted before the warm cache. Each key holds at most the
// last `max_points` candles of its series. A lookup only counts as a hit
// when the stored slice already covers the requested number of points;
// shorter entries are treated as misses so callers fall through to a tier
// that can satisfy the full request.
// =============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::{Candle, SeriesKey};

pub struct HotCache {
    entries: RwLock<HashMap<SeriesKey, Vec<Candle>>>,
    max_points: usize,
}

impl HotCache {
    pub fn new(max_points: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_points,
        }
    }

    /// Install the trailing `max_points` of `series` for `key`, replacing
    /// any previous entry.
    pub fn put(&self, key: SeriesKey, series: &[Candle]) {
        let start = series.len().saturating_sub(self.max_points);
        let slice = series[start..].to_vec();
        self.entries.write().insert(key, slice);
    }

    /// Return the trailing `limit` points for `key`, or `None` when the
    /// entry is absent or holds fewer than `limit` points.
    pub fn get(&self, key: &SeriesKey, limit: usize) -> Option<Vec<Candle>> {
        let map = self.entries.read();
        let slice = map.get(key)?;
        if slice.len() < limit {
            return None;
        }
        let start = slice.len() - limit;
        Some(slice[start..].to_vec())
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
                timestamp: i as i64 * 60_000,
                open: i as f64,
                high: i as f64,
                low: i as f64,
                close: i as f64,
                volume: 1.0,
            })
            .collect()
    }

    fn key() -> SeriesKey {
        SeriesKey::new("BTC", Timeframe::Hour1)
    }

    #[test]
    fn put_keeps_only_the_trailing_window() {
        let cache = HotCache::new(50);
        cache.put(key(), &series(200));

        let hit = cache.get(&key(), 50).expect("full window should hit");
        assert_eq!(hit.len(), 50);
        // Trailing window: timestamps 150..200.
        assert_eq!(hit[0].timestamp, 150 * 60_000);
        assert_eq!(hit[49].timestamp, 199 * 60_000);
    }

    #[test]
    fn short_entry_is_a_miss_not_a_partial_hit() {
        let cache = HotCache::new(50);
        cache.put(key(), &series(30));

        assert!(cache.get(&key(), 50).is_none());
        assert!(cache.get(&key(), 31).is_none());
        assert_eq!(cache.get(&key(), 30).map(|s| s.len()), Some(30));
    }

    #[test]
    fn get_returns_exactly_the_requested_tail() {
        let cache = HotCache::new(50);
        cache.put(key(), &series(50));

        let hit = cache.get(&key(), 10).expect("should hit");
        assert_eq!(hit.len(), 10);
        assert_eq!(hit[0].timestamp, 40 * 60_000);
    }

    #[test]
    fn absent_key_is_a_miss() {
        let cache = HotCache::new(50);
        assert!(cache.get(&key(), 1).is_none());
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn put_replaces_the_previous_entry() {
        let cache = HotCache::new(50);
        cache.put(key(), &series(50));
        cache.put(key(), &series(10));

        assert!(cache.get(&key(), 50).is_none());
        assert_eq!(cache.get(&key(), 10).map(|s| s.len()), Some(10));
        assert_eq!(cache.entry_count(), 1);
    }
}
