// =============================================================================
// Series merge
// =============================================================================
//
// Combines two candle series into one canonical ascending series keyed by
// bucket timestamp. The second argument wins on timestamp collisions, so a
// freshly fetched batch overwrites whatever was stored for the same bucket.
// =============================================================================

use std::collections::BTreeMap;

use crate::types::Candle;

/// Merge two series into one, ordered ascending by timestamp with no
/// duplicate buckets.
///
/// On a shared timestamp the candle from `fresh` replaces the one from
/// `existing`. Input ordering does not matter; the output is always sorted.
/// Merging a series with itself returns that series unchanged.
pub fn merge_series(existing: Vec<Candle>, fresh: Vec<Candle>) -> Vec<Candle> {
    let mut by_ts: BTreeMap<i64, Candle> = BTreeMap::new();
    for candle in existing {
        by_ts.insert(candle.timestamp, candle);
    }
    for candle in fresh {
        by_ts.insert(candle.timestamp, candle);
    }
    by_ts.into_values().collect()
}
