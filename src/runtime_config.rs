// =============================================================================
// Runtime Configuration — settings with atomic save
// =============================================================================
//
// Central configuration hub for the candlevault service.  Every tunable
// parameter lives here so that deployments can be adjusted through one JSON
// file instead of a rebuild.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec![
        "BTC".to_string(),
        "SOL".to_string(),
        "TAO".to_string(),
        "WIF".to_string(),
    ]
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_data_dir() -> String {
    "historical_data".to_string()
}

fn default_rest_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_ws_base_url() -> String {
    "wss://stream.binance.com:9443".to_string()
}

fn default_fetch_page_size() -> usize {
    1000
}

fn default_fetch_delay_ms() -> u64 {
    1000
}

fn default_warm_ttl_secs() -> u64 {
    600
}

fn default_warm_capacity() -> usize {
    5
}

fn default_hot_points() -> usize {
    50
}

fn default_live_capacity() -> usize {
    1000
}

fn default_refresh_interval_hours() -> u64 {
    24
}

fn default_training_interval_hours() -> u64 {
    24
}

fn default_status_log_interval_secs() -> u64 {
    300
}

fn default_refresh_pause_ms() -> u64 {
    2000
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the candlevault service.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Market coverage -----------------------------------------------------

    /// Base asset codes the service tracks (quote asset appended upstream).
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Quote asset appended to every symbol for upstream requests.
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,

    // --- Storage & upstream --------------------------------------------------

    /// Directory holding the per-series JSON files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Upstream REST base URL.
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,

    /// Upstream websocket base URL for the live ticker stream.
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,

    /// Candles per upstream page. The upstream caps this at 1000.
    #[serde(default = "default_fetch_page_size")]
    pub fetch_page_size: usize,

    /// Pause between paginated upstream calls, in milliseconds.
    #[serde(default = "default_fetch_delay_ms")]
    pub fetch_delay_ms: u64,

    // --- Cache sizing --------------------------------------------------------

    /// Warm cache time-to-live per entry, in seconds.
    #[serde(default = "default_warm_ttl_secs")]
    pub warm_ttl_secs: u64,

    /// Maximum number of series the warm cache holds.
    #[serde(default = "default_warm_capacity")]
    pub warm_capacity: usize,

    /// Trailing points kept per series in the hot cache.
    #[serde(default = "default_hot_points")]
    pub hot_points: usize,

    /// Ticker updates retained per symbol in the live buffer.
    #[serde(default = "default_live_capacity")]
    pub live_capacity: usize,

    // --- Background tasks ----------------------------------------------------

    /// Hours between incremental refresh passes.
    #[serde(default = "default_refresh_interval_hours")]
    pub refresh_interval_hours: u64,

    /// Hours between training collection passes.
    #[serde(default = "default_training_interval_hours")]
    pub training_interval_hours: u64,

    /// Seconds between status log lines.
    #[serde(default = "default_status_log_interval_secs")]
    pub status_log_interval_secs: u64,

    /// Pause between per-pair refreshes inside one pass, in milliseconds.
    #[serde(default = "default_refresh_pause_ms")]
    pub refresh_pause_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            quote_asset: default_quote_asset(),
            data_dir: default_data_dir(),
            rest_base_url: default_rest_base_url(),
            ws_base_url: default_ws_base_url(),
            fetch_page_size: default_fetch_page_size(),
            fetch_delay_ms: default_fetch_delay_ms(),
            warm_ttl_secs: default_warm_ttl_secs(),
            warm_capacity: default_warm_capacity(),
            hot_points: default_hot_points(),
            live_capacity: default_live_capacity(),
            refresh_interval_hours: default_refresh_interval_hours(),
            training_interval_hours: default_training_interval_hours(),
            status_log_interval_secs: default_status_log_interval_secs(),
            refresh_pause_ms: default_refresh_pause_ms(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            data_dir = %config.data_dir,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    ///
    /// This prevents corruption if the process crashes mid-write.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        // Atomic write: write to a temporary sibling file, then rename.
        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.symbols, vec!["BTC", "SOL", "TAO", "WIF"]);
        assert_eq!(cfg.quote_asset, "USDT");
        assert_eq!(cfg.data_dir, "historical_data");
        assert_eq!(cfg.fetch_page_size, 1000);
        assert_eq!(cfg.fetch_delay_ms, 1000);
        assert_eq!(cfg.warm_ttl_secs, 600);
        assert_eq!(cfg.warm_capacity, 5);
        assert_eq!(cfg.hot_points, 50);
        assert_eq!(cfg.live_capacity, 1000);
        assert_eq!(cfg.refresh_interval_hours, 24);
        assert_eq!(cfg.status_log_interval_secs, 300);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.symbols.len(), 4);
        assert_eq!(cfg.quote_asset, "USDT");
        assert_eq!(cfg.fetch_page_size, 1000);
        assert_eq!(cfg.refresh_pause_ms, 2000);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbols": ["ETH"], "warm_capacity": 10 }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbols, vec!["ETH"]);
        assert_eq!(cfg.warm_capacity, 10);
        assert_eq!(cfg.hot_points, 50);
        assert_eq!(cfg.data_dir, "historical_data");
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = RuntimeConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.symbols, cfg2.symbols);
        assert_eq!(cfg.fetch_page_size, cfg2.fetch_page_size);
        assert_eq!(cfg.warm_ttl_secs, cfg2.warm_ttl_secs);
    }

    #[test]
    fn save_then_load_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candlevault_config.json");

        let mut cfg = RuntimeConfig::default();
        cfg.symbols = vec!["BTC".to_string()];
        cfg.hot_points = 75;
        cfg.save(&path).unwrap();

        // No tmp sibling left behind after the rename.
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.symbols, vec!["BTC"]);
        assert_eq!(loaded.hot_points, 75);
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RuntimeConfig::load(dir.path().join("absent.json")).is_err());
    }
}
