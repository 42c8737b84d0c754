// =============================================================================
// History engine — tiered read path with per-key single-flight refresh
// =============================================================================
//
// Read path: hot cache → warm cache → cold store. Data that is stale or too
// small for the request triggers one fetch-merge-persist pass before
// serving. Concurrent requests for the same key share a single refresh: the
// first caller does the upstream work while holding the key's slot, the
// rest wait on the slot and then re-check the tiers. A failed refresh
// degrades to whatever data already exists; the engine never surfaces an
// error for a key that has any data at all.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::binance::{Fetcher, KlineSource};
use crate::cache::{HotCache, WarmCache};
use crate::freshness;
use crate::merge::merge_series;
use crate::storage::ColdStore;
use crate::types::{Candle, SeriesKey, Timeframe};

/// Daily points in the five-year full-history view.
pub const FULL_HISTORY_POINTS: usize = 1825;

/// Incremental refresh depth used by the background pass and the admin
/// refresh route when no explicit point count is given: a month of daily
/// buckets, a week of anything finer.
pub fn default_refresh_points(timeframe: Timeframe) -> usize {
    match timeframe {
        Timeframe::Day1 => 30,
        _ => 168,
    }
}

pub struct HistoryEngine<S: KlineSource> {
    fetcher: Fetcher<S>,
    store: ColdStore,
    warm: WarmCache,
    hot: HotCache,
    /// One refresh slot per key; the slot is held across the fetch awaits,
    /// the map lock never is.
    flights: RwLock<HashMap<SeriesKey, Arc<Mutex<()>>>>,
}

fn tail(series: &[Candle], limit: usize) -> Vec<Candle> {
    let start = series.len().saturating_sub(limit);
    series[start..].to_vec()
}

impl<S: KlineSource> HistoryEngine<S> {
    pub fn new(fetcher: Fetcher<S>, store: ColdStore, warm: WarmCache, hot: HotCache) -> Self {
        Self {
            fetcher,
            store,
            warm,
            hot,
            flights: RwLock::new(HashMap::new()),
        }
    }

    fn flight_slot(&self, key: &SeriesKey) -> Arc<Mutex<()>> {
        if let Some(slot) = self.flights.read().get(key) {
            return slot.clone();
        }
        self.flights
            .write()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Refill the in-memory tiers and return the trailing `limit` slice.
    fn serve(
        &self,
        key: &SeriesKey,
        series: Vec<Candle>,
        limit: usize,
        refill_warm: bool,
    ) -> Vec<Candle> {
        if !series.is_empty() {
            if refill_warm {
                self.warm.put(key.clone(), series.clone());
            }
            self.hot.put(key.clone(), &series);
        }
        tail(&series, limit)
    }

    /// Trailing `limit` points for (symbol, timeframe), ascending.
    ///
    /// Serves straight from the cache tiers when the data is big enough and
    /// not stale; otherwise performs one upstream refresh under the key's
    /// flight slot and serves the merged result. With nothing cached and an
    /// empty fetch the result is an empty series, never an error.
    #[instrument(skip(self), name = "history::get_data")]
    pub async fn get_data(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Vec<Candle> {
        let key = SeriesKey::new(symbol, timeframe);

        // Hot tier: hit only when the cached slice covers the request.
        if let Some(slice) = self.hot.get(&key, limit) {
            debug!(key = %key, limit, "hot cache hit");
            return slice;
        }

        // Warm tier holds full series; a hit refills the hot tier. On a
        // miss fall through to the durable copy.
        let (series, from_warm) = match self.warm.get(&key) {
            Some(series) => {
                debug!(key = %key, points = series.len(), "warm cache hit");
                (series, true)
            }
            None => (self.store.load(&key), false),
        };

        let age = self.store.last_write_age(&key);
        if !freshness::is_stale(age, timeframe) && freshness::has_enough(&series, limit) {
            return self.serve(&key, series, limit, !from_warm);
        }

        // Miss or stale: refresh under this key's slot. Whoever got the
        // slot first does the upstream work; everyone else re-checks after.
        let slot = self.flight_slot(&key);
        let _guard = slot.lock().await;

        if let Some(slice) = self.hot.get(&key, limit) {
            debug!(key = %key, "another flight refreshed this key");
            return slice;
        }
        let existing = self.store.load(&key);
        let age = self.store.last_write_age(&key);
        if !freshness::is_stale(age, timeframe) && freshness::has_enough(&existing, limit) {
            return self.serve(&key, existing, limit, true);
        }

        // A failed save leaves the richest copy only in the in-memory tiers.
        // Fold the pre-slot read back in so a degraded pass cannot drop it;
        // the durable copy wins shared timestamps.
        let existing = merge_series(series, existing);

        info!(
            key = %key,
            cached = existing.len(),
            requested = limit,
            stale = freshness::is_stale(age, timeframe),
            "refreshing series from upstream"
        );

        let fresh = self.fetch_for(symbol, timeframe, limit).await;
        if fresh.is_empty() {
            // Degraded but available: serve whatever exists, even stale.
            warn!(
                key = %key,
                cached = existing.len(),
                "upstream returned nothing, serving cached data"
            );
            return self.serve(&key, existing, limit, true);
        }

        let current = self.persist_merged(&key, existing, fresh);
        self.serve(&key, current, limit, true)
    }

    /// Single bounded batch for ordinary requests; backward pagination for
    /// the large daily pulls that exceed one upstream page.
    async fn fetch_for(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Vec<Candle> {
        if timeframe == Timeframe::Day1 && limit > self.fetcher.page_size() {
            return self.fetcher.fetch_deep(symbol, timeframe, limit).await;
        }
        match self.fetcher.fetch_batch(symbol, timeframe, limit, None).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(symbol, timeframe = %timeframe, error = %e, "batch fetch failed");
                Vec::new()
            }
        }
    }

    /// Merge fresh data into the durable copy and return the authoritative
    /// series. A failed save keeps the merged series in memory for this
    /// cycle; durability is best-effort.
    fn persist_merged(
        &self,
        key: &SeriesKey,
        existing: Vec<Candle>,
        fresh: Vec<Candle>,
    ) -> Vec<Candle> {
        let merged = merge_series(existing, fresh);
        match self.store.save(key, &merged) {
            Ok(()) => {
                let reloaded = self.store.load(key);
                if reloaded.is_empty() {
                    merged
                } else {
                    reloaded
                }
            }
            Err(e) => {
                error!(key = %key, error = %e, "failed to persist merged series, keeping it in memory");
                merged
            }
        }
    }

    /// Five-year daily view.
    pub async fn get_full_history(&self, symbol: &str) -> Vec<Candle> {
        self.get_data(symbol, Timeframe::Day1, FULL_HISTORY_POINTS).await
    }

    /// Full series for model training, deep-fetched up to the timeframe's
    /// required point target when the durable copy is undersized. A short
    /// result signals insufficient data by its length, not by an error.
    #[instrument(skip(self), name = "history::get_training_data")]
    pub async fn get_training_data(&self, symbol: &str, timeframe: Timeframe) -> Vec<Candle> {
        let key = SeriesKey::new(symbol, timeframe);
        let required = freshness::required_points(timeframe);

        let existing = self.store.load(&key);
        if freshness::has_enough(&existing, required) {
            return existing;
        }

        let slot = self.flight_slot(&key);
        let _guard = slot.lock().await;

        let existing = self.store.load(&key);
        if freshness::has_enough(&existing, required) {
            return existing;
        }

        info!(
            key = %key,
            cached = existing.len(),
            required,
            "training series undersized, deep fetching"
        );

        let fresh = self.fetcher.fetch_deep(symbol, timeframe, required).await;
        if fresh.is_empty() {
            return existing;
        }

        let current = self.persist_merged(&key, existing, fresh);
        // The warm tier may hold the old short series for this key.
        self.warm.invalidate(&key);
        current
    }

    /// One forced fetch-merge-persist pass, used by the background refresh
    /// loop and the admin refresh route. Returns the resulting series
    /// length.
    #[instrument(skip(self), name = "history::refresh")]
    pub async fn refresh(&self, symbol: &str, timeframe: Timeframe, points: usize) -> usize {
        let key = SeriesKey::new(symbol, timeframe);

        let slot = self.flight_slot(&key);
        let _guard = slot.lock().await;

        let fresh = if points > self.fetcher.page_size() {
            self.fetcher.fetch_deep(symbol, timeframe, points).await
        } else {
            match self.fetcher.fetch_batch(symbol, timeframe, points, None).await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(key = %key, error = %e, "refresh fetch failed");
                    Vec::new()
                }
            }
        };

        if fresh.is_empty() {
            return self.store.load(&key).len();
        }

        let existing = self.store.load(&key);
        let current = self.persist_merged(&key, existing, fresh);
        let len = current.len();

        self.warm.put(key.clone(), current.clone());
        self.hot.put(key.clone(), &current);
        info!(key = %key, points = len, "series refreshed");
        len
    }

    // -------------------------------------------------------------------------
    // Status counters
    // -------------------------------------------------------------------------

    pub fn store_age(&self, key: &SeriesKey) -> Option<std::time::Duration> {
        self.store.last_write_age(key)
    }

    pub fn hot_entries(&self) -> usize {
        self.hot.entry_count()
    }

    pub fn warm_entries(&self) -> usize {
        self.warm.entry_count()
    }
}
