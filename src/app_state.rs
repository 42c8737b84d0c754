// =============================================================================
// Central Application State — candlevault service
// =============================================================================
//
// The single source of truth for the service. The history engine and live
// buffer manage their own interior mutability; AppState ties them together
// and provides the status snapshot for the REST API and the price map for
// the WebSocket feed.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock around the runtime configuration.
//   - The whole struct is constructed once and shared via Arc.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

use crate::binance::{BinanceGateway, Fetcher};
use crate::cache::{HotCache, WarmCache};
use crate::history::HistoryEngine;
use crate::live::LiveBuffer;
use crate::runtime_config::RuntimeConfig;
use crate::storage::ColdStore;
use crate::types::{SeriesKey, Timeframe};

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter, incremented whenever live
    /// data changes. The WebSocket feed uses this to detect changes and
    /// push updates.
    pub state_version: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    /// Tiered historical data engine.
    pub engine: HistoryEngine<BinanceGateway>,

    /// Streamed live price updates per symbol.
    pub live: LiveBuffer,

    /// Instant when the service was started. Used for uptime calculations.
    pub start_time: Instant,
}

impl AppState {
    /// Construct the state from the given runtime configuration. The
    /// returned value is typically wrapped in `Arc` immediately.
    pub fn new(config: RuntimeConfig) -> Self {
        let gateway = BinanceGateway::new(config.rest_base_url.clone(), config.quote_asset.clone());
        let fetcher = Fetcher::new(
            gateway,
            config.fetch_page_size,
            Duration::from_millis(config.fetch_delay_ms),
        );
        let engine = HistoryEngine::new(
            fetcher,
            ColdStore::new(config.data_dir.clone()),
            WarmCache::new(config.warm_capacity, Duration::from_secs(config.warm_ttl_secs)),
            HotCache::new(config.hot_points),
        );

        Self {
            state_version: AtomicU64::new(1),
            engine,
            live: LiveBuffer::new(config.live_capacity),
            runtime_config: Arc::new(RwLock::new(config)),
            start_time: Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    /// Atomically increment the state version. Call this after every live
    /// data mutation to signal WebSocket clients that fresh data is
    /// available.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    /// Read the current state version without modifying it.
    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Snapshot Builders ───────────────────────────────────────────────

    /// Latest price and update time per configured symbol, for the
    /// WebSocket push payload.
    pub fn build_price_map(&self) -> HashMap<String, PricePoint> {
        let symbols = self.runtime_config.read().symbols.clone();
        let mut prices = HashMap::new();
        for symbol in symbols {
            if let (Some(price), Some(ts)) = (
                self.live.current_price(&symbol),
                self.live.last_update_time(&symbol),
            ) {
                prices.insert(symbol, PricePoint { price, ts });
            }
        }
        prices
    }

    /// Full operational status for `GET /api/status`.
    pub fn build_status(&self) -> StatusSnapshot {
        let symbols = self.runtime_config.read().symbols.clone();

        let mut symbol_status = HashMap::new();
        for symbol in symbols {
            let series = Timeframe::all()
                .iter()
                .filter_map(|&timeframe| {
                    let key = SeriesKey::new(&symbol, timeframe);
                    self.engine.store_age(&key).map(|age| SeriesStatus {
                        timeframe,
                        age_secs: age.as_secs(),
                    })
                })
                .collect();

            symbol_status.insert(
                symbol.clone(),
                SymbolStatus {
                    live_points: self.live.data_count(&symbol),
                    coverage_days: self.live.coverage_days(&symbol),
                    current_price: self.live.current_price(&symbol),
                    last_update_ms: self.live.last_update_time(&symbol),
                    series,
                },
            );
        }

        StatusSnapshot {
            state_version: self.current_state_version(),
            server_time: chrono::Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            hot_entries: self.engine.hot_entries(),
            warm_entries: self.engine.warm_entries(),
            symbols: symbol_status,
        }
    }
}

// =============================================================================
// Serialisable snapshot types
// =============================================================================

/// Latest live price for one symbol.
#[derive(Debug, Clone, Serialize)]
pub struct PricePoint {
    pub price: f64,
    pub ts: i64,
}

/// Durable-copy freshness for one (symbol, timeframe) series.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesStatus {
    pub timeframe: Timeframe,
    pub age_secs: u64,
}

/// Live coverage and stored-series ages for one symbol.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolStatus {
    pub live_points: usize,
    pub coverage_days: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_ms: Option<i64>,
    pub series: Vec<SeriesStatus>,
}

/// Full service status sent to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub hot_entries: usize,
    pub warm_entries: usize,
    pub symbols: HashMap<String, SymbolStatus>,
}

// =============================================================================
// Tests
// =============================================================================
