// =============================================================================
// Shared types used across the candlevault data service
// =============================================================================

use serde::{Deserialize, Serialize};

/// One closed OHLCV bucket. `timestamp` is the bucket open time in
/// milliseconds and is unique within a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

/// One live ticker update from the price stream. Lives only in the live
/// buffer; never merged into the durable historical series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: f64,
    #[serde(default)]
    pub volume: f64,
    pub timestamp: i64,
    #[serde(default)]
    pub open: f64,
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub low: f64,
}

/// Candle bucket width. Parsing is case-sensitive: `1m` is one minute,
/// `1M` is one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
    #[serde(rename = "1M")]
    Month1,
}

impl Timeframe {
    pub fn parse(s: &str) -> Option<Timeframe> {
        match s.trim() {
            "1m" => Some(Timeframe::Min1),
            "1h" => Some(Timeframe::Hour1),
            "4h" => Some(Timeframe::Hour4),
            "1d" => Some(Timeframe::Day1),
            "1w" => Some(Timeframe::Week1),
            "1M" => Some(Timeframe::Month1),
            _ => None,
        }
    }

    /// Canonical code used in storage filenames and API paths.
    pub fn code(&self) -> &'static str {
        match self {
            Timeframe::Min1 => "1m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Day1 => "1d",
            Timeframe::Week1 => "1w",
            Timeframe::Month1 => "1M",
        }
    }

    /// Interval code sent to the upstream klines endpoint. Monthly series
    /// are requested with the hourly code while keeping the `1M` storage
    /// key, matching the files this service inherits.
    pub fn interval_code(&self) -> &'static str {
        match self {
            Timeframe::Min1 => "1m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Day1 => "1d",
            Timeframe::Week1 => "1w",
            Timeframe::Month1 => "1h",
        }
    }

    /// All timeframes in ascending bucket width.
    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::Min1,
            Timeframe::Hour1,
            Timeframe::Hour4,
            Timeframe::Day1,
            Timeframe::Week1,
            Timeframe::Month1,
        ]
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Normalized (symbol, timeframe) key for caches and storage. Symbols are
/// trimmed and uppercased on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl SeriesKey {
    pub fn new(symbol: &str, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            timeframe,
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.symbol, self.timeframe)
    }
}
