use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use tracing::debug;

use crate::types::PriceUpdate;

// ---------------------------------------------------------------------------
// LiveBuffer -- bounded per-symbol ring of streamed price updates
// ---------------------------------------------------------------------------

/// Thread-safe ring buffer holding the most recent price updates per symbol.
/// Appends past `capacity` evict the oldest entries; readers get ascending
/// slices in arrival order.
pub struct LiveBuffer {
    series: RwLock<HashMap<String, VecDeque<PriceUpdate>>>,
    capacity: usize,
}

impl LiveBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Append one streamed update, trimming the ring to capacity.
    pub fn append(&self, update: PriceUpdate) {
        let mut map = self.series.write();
        let ring = map
            .entry(update.symbol.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        ring.push_back(update);
        while ring.len() > self.capacity {
            ring.pop_front();
        }
        debug!(points = ring.len(), "live update stored");
    }

    /// Replace a symbol's ring with the trailing `capacity` entries of
    /// `history`. Used at startup to give consumers context before the
    /// stream has produced anything.
    pub fn seed(&self, symbol: &str, history: Vec<PriceUpdate>) {
        let start = history.len().saturating_sub(self.capacity);
        let ring: VecDeque<PriceUpdate> = history[start..].iter().cloned().collect();
        self.series.write().insert(symbol.to_string(), ring);
    }

    /// Trailing `limit` updates for a symbol, oldest first.
    pub fn recent(&self, symbol: &str, limit: usize) -> Vec<PriceUpdate> {
        let map = self.series.read();
        match map.get(symbol) {
            Some(ring) => {
                let start = ring.len().saturating_sub(limit);
                ring.iter().skip(start).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Everything currently buffered for a symbol, oldest first.
    pub fn all(&self, symbol: &str) -> Vec<PriceUpdate> {
        let map = self.series.read();
        map.get(symbol)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn current_price(&self, symbol: &str) -> Option<f64> {
        let map = self.series.read();
        map.get(symbol).and_then(|ring| ring.back()).map(|u| u.price)
    }

    pub fn last_update_time(&self, symbol: &str) -> Option<i64> {
        let map = self.series.read();
        map.get(symbol)
            .and_then(|ring| ring.back())
            .map(|u| u.timestamp)
    }

    pub fn data_count(&self, symbol: &str) -> usize {
        let map = self.series.read();
        map.get(symbol).map_or(0, VecDeque::len)
    }

    pub fn has_sufficient(&self, symbol: &str, minimum_points: usize) -> bool {
        self.data_count(symbol) >= minimum_points
    }

    /// Span between the oldest and newest buffered update, in days.
    pub fn coverage_days(&self, symbol: &str) -> f64 {
        let map = self.series.read();
        match map.get(symbol) {
            Some(ring) if ring.len() >= 2 => {
                let oldest = ring.front().map(|u| u.timestamp).unwrap_or(0);
                let newest = ring.back().map(|u| u.timestamp).unwrap_or(0);
                (newest - oldest) as f64 / (1000.0 * 60.0 * 60.0 * 24.0)
            }
            _ => 0.0,
        }
    }

    /// Symbols that currently hold at least one update.
    pub fn symbols(&self) -> Vec<String> {
        let map = self.series.read();
        map.iter()
            .filter(|(_, ring)| !ring.is_empty())
            .map(|(symbol, _)| symbol.clone())
            .collect()
    }
}
