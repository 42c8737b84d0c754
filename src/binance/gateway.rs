// =============================================================================
// Binance market-data gateway — public klines endpoint
// =============================================================================
//
// Read-only REST access to the klines endpoint. No credentials and no signed
// requests: this service consumes public market data only. Numeric fields
// arrive as JSON strings and are parsed leniently; malformed rows are
// skipped so one bad entry cannot poison a whole batch.
// =============================================================================

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::binance::fetcher::KlineSource;
use crate::types::{Candle, Timeframe};

/// Default public REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

#[derive(Debug, Clone)]
pub struct BinanceGateway {
    http: reqwest::Client,
    base_url: String,
    quote_asset: String,
}

impl BinanceGateway {
    /// Create a gateway against `base_url`, quoting symbols in `quote_asset`
    /// (`BTC` becomes the upstream pair `BTCUSDT`).
    pub fn new(base_url: impl Into<String>, quote_asset: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            http,
            base_url: base_url.into(),
            quote_asset: quote_asset.into().to_uppercase(),
        }
    }

    /// Upstream trading pair for a base symbol.
    fn pair(&self, symbol: &str) -> String {
        format!("{}{}", symbol.trim().to_uppercase(), self.quote_asset)
    }

    fn klines_url(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        end_time: Option<i64>,
    ) -> String {
        let mut url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            self.pair(symbol),
            timeframe.interval_code(),
            limit
        );
        if let Some(end) = end_time {
            url.push_str(&format!("&endTime={end}"));
        }
        url
    }

    /// GET /api/v3/klines (public).
    ///
    /// Array indices consumed:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        end_time: Option<i64>,
    ) -> Result<Vec<Candle>> {
        let url = self.klines_url(symbol, timeframe, limit, end_time);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse klines response")?;

        if !status.is_success() {
            anyhow::bail!("Binance GET /api/v3/klines returned {}: {}", status, body);
        }

        let candles = parse_kline_rows(symbol, &body)?;
        debug!(
            symbol,
            interval = timeframe.interval_code(),
            count = candles.len(),
            "klines fetched"
        );
        Ok(candles)
    }
}

impl KlineSource for BinanceGateway {
    async fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        end_time: Option<i64>,
    ) -> Result<Vec<Candle>> {
        self.get_klines(symbol, timeframe, limit, end_time).await
    }
}

/// Parse the klines response body into candles for `symbol`.
///
/// The body must be an array of arrays. Rows with fewer than six elements or
/// with unparseable numbers are skipped with a warning rather than failing
/// the batch.
fn parse_kline_rows(symbol: &str, body: &serde_json::Value) -> Result<Vec<Candle>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let symbol = symbol.trim().to_uppercase();
    let mut candles = Vec::with_capacity(raw.len());

    for entry in raw {
        let Some(arr) = entry.as_array() else {
            warn!("skipping kline entry that is not an array");
            continue;
        };

        if arr.len() < 6 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let Some(timestamp) = arr[0].as_i64() else {
            warn!("skipping kline entry with non-integer open time");
            continue;
        };

        let parsed = (|| -> Result<Candle> {
            Ok(Candle {
                symbol: symbol.clone(),
                timestamp,
                open: parse_str_f64(&arr[1])?,
                high: parse_str_f64(&arr[2])?,
                low: parse_str_f64(&arr[3])?,
                close: parse_str_f64(&arr[4])?,
                volume: parse_str_f64(&arr[5])?,
            })
        })();

        match parsed {
            Ok(candle) => candles.push(candle),
            Err(e) => warn!(error = %e, "skipping kline entry with bad numeric field"),
        }
    }

    Ok(candles)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn klines_url_shape() {
        let gw = BinanceGateway::new("https://api.binance.com", "usdt");
        let url = gw.klines_url("btc", Timeframe::Hour1, 500, None);
        assert_eq!(
            url,
            "https://api.binance.com/api/v3/klines?symbol=BTCUSDT&interval=1h&limit=500"
        );
    }

    #[test]
    fn klines_url_appends_end_time_when_set() {
        let gw = BinanceGateway::new("https://api.binance.com", "USDT");
        let url = gw.klines_url("BTC", Timeframe::Day1, 1000, Some(1_700_000_000_000));
        assert!(url.ends_with("&endTime=1700000000000"));
        assert!(url.contains("interval=1d"));
    }

    #[test]
    fn monthly_requests_use_the_hourly_interval_code() {
        let gw = BinanceGateway::new(DEFAULT_BASE_URL, "USDT");
        let url = gw.klines_url("BTC", Timeframe::Month1, 48, None);
        assert!(url.contains("interval=1h"));
    }

    #[test]
    fn parse_rows_handles_string_and_numeric_fields() {
        let body = serde_json::json!([
            [1700000000000_i64, "37000.1", "37100.2", "36900.3", "37050.4", "123.5", 1700003599999_i64],
            [1700003600000_i64, 37050.4, 37200.0, 37000.0, 37150.0, 98.7, 1700007199999_i64]
        ]);
        let candles = parse_kline_rows("btc", &body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].symbol, "BTC");
        assert_eq!(candles[0].timestamp, 1_700_000_000_000);
        assert!((candles[0].close - 37050.4).abs() < 1e-9);
        assert!((candles[1].open - 37050.4).abs() < 1e-9);
    }

    #[test]
    fn parse_rows_skips_malformed_entries() {
        let body = serde_json::json!([
            [1700000000000_i64, "1.0", "2.0", "0.5", "1.5", "10.0"],
            [1700000060000_i64, "1.0"],
            [1700000120000_i64, "not-a-number", "2.0", "0.5", "1.5", "10.0"],
            "not even an array",
            [1700000180000_i64, "2.0", "3.0", "1.5", "2.5", "20.0"]
        ]);
        let candles = parse_kline_rows("BTC", &body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1_700_000_000_000);
        assert_eq!(candles[1].timestamp, 1_700_000_180_000);
    }

    #[test]
    fn parse_rows_rejects_a_non_array_body() {
        let body = serde_json::json!({"code": -1121, "msg": "Invalid symbol."});
        assert!(parse_kline_rows("BTC", &body).is_err());
    }
}
