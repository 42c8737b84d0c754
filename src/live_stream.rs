// =============================================================================
// Live Ticker Stream — miniTicker ingest into the live buffer
// =============================================================================
//
// One combined-stream WebSocket carries miniTicker frames for every tracked
// symbol. Each frame becomes a `PriceUpdate` appended to the live buffer,
// and the shared state version is bumped so connected clients get a push.
//
// At boot the buffer is seeded from the stored daily history so coverage
// stats and charts are populated before the first live tick arrives.
// =============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::types::{Candle, PriceUpdate};

// ---------------------------------------------------------------------------
// Ticker WebSocket stream
// ---------------------------------------------------------------------------

/// Connect to the combined miniTicker WebSocket stream for all tracked
/// symbols and feed updates into the live buffer.
///
/// Runs until the stream disconnects or an error occurs, then returns so that
/// the caller (main.rs) can handle reconnection.
pub async fn run_ticker_stream(
    symbols: &[String],
    quote_asset: &str,
    ws_base_url: &str,
    state: &Arc<AppState>,
) -> Result<()> {
    let streams: Vec<String> = symbols
        .iter()
        .map(|s| format!("{}{}@miniTicker", s.to_lowercase(), quote_asset.to_lowercase()))
        .collect();
    let url = format!("{}/stream?streams={}", ws_base_url, streams.join("/"));
    info!(url = %url, count = symbols.len(), "connecting to ticker WebSocket");

    let (ws_stream, _response) = connect_async(&url)
        .await
        .context("failed to connect to ticker WebSocket")?;

    info!(count = symbols.len(), "ticker WebSocket connected");
    let (_write, mut read) = ws_stream.split();

    loop {
        match read.next().await {
            Some(Ok(msg)) => {
                if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                    match parse_mini_ticker(&text, quote_asset) {
                        Ok(Some(update)) => {
                            state.live.append(update);
                            state.increment_version();
                        }
                        Ok(None) => {
                            // Not a miniTicker payload (subscription acks etc.).
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to parse miniTicker message");
                        }
                    }
                }
            }
            Some(Err(e)) => {
                error!(error = %e, "ticker WebSocket read error");
                return Err(e.into());
            }
            None => {
                warn!("ticker WebSocket stream ended");
                return Ok(());
            }
        }
    }
}

/// Parse a combined-stream miniTicker message.
///
/// Expected shape:
/// ```json
/// {
///   "stream": "btcusdt@miniTicker",
///   "data": {
///     "e": "24hrMiniTicker", "E": 1700000000000, "s": "BTCUSDT",
///     "c": "37000.0", "o": "36500.0", "h": "37200.0", "l": "36400.0",
///     "v": "12345.6"
///   }
/// }
/// ```
///
/// Returns `Ok(None)` for frames that are not miniTicker events. The pair
/// symbol is reduced to its base asset (`BTCUSDT` -> `BTC`) so live data
/// shares keys with the historical series.
fn parse_mini_ticker(text: &str, quote_asset: &str) -> Result<Option<PriceUpdate>> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse ticker JSON")?;

    let data = match root.get("data") {
        Some(data) => data,
        None => return Ok(None),
    };
    if data["e"].as_str() != Some("24hrMiniTicker") {
        return Ok(None);
    }

    let pair = data["s"].as_str().context("missing field s")?;
    let symbol = pair
        .strip_suffix(quote_asset)
        .unwrap_or(pair)
        .to_string();

    let price: f64 = data["c"]
        .as_str()
        .context("missing field c")?
        .parse()
        .context("failed to parse close price")?;
    let open: f64 = data["o"]
        .as_str()
        .context("missing field o")?
        .parse()
        .context("failed to parse open price")?;
    let high: f64 = data["h"]
        .as_str()
        .context("missing field h")?
        .parse()
        .context("failed to parse high price")?;
    let low: f64 = data["l"]
        .as_str()
        .context("missing field l")?
        .parse()
        .context("failed to parse low price")?;
    let volume: f64 = data["v"]
        .as_str()
        .context("missing field v")?
        .parse()
        .context("failed to parse volume")?;
    let timestamp = data["E"].as_i64().context("missing field E")?;

    Ok(Some(PriceUpdate {
        symbol,
        price,
        volume,
        timestamp,
        open,
        high,
        low,
    }))
}

// ---------------------------------------------------------------------------
// Boot-time seeding
// ---------------------------------------------------------------------------

fn candle_to_update(candle: &Candle) -> PriceUpdate {
    PriceUpdate {
        symbol: candle.symbol.clone(),
        price: candle.close,
        volume: candle.volume,
        timestamp: candle.timestamp,
        open: candle.open,
        high: candle.high,
        low: candle.low,
    }
}

/// Seed the live buffer from the stored daily history for every tracked
/// symbol. Failures are logged and skipped; a symbol with no history simply
/// starts empty and fills from the stream.
pub async fn warmup(state: &Arc<AppState>) {
    let symbols = state.runtime_config.read().symbols.clone();

    for symbol in &symbols {
        let history = state.engine.get_full_history(symbol).await;
        if history.is_empty() {
            warn!(symbol = %symbol, "no daily history available to seed live buffer");
            continue;
        }

        let updates: Vec<PriceUpdate> = history.iter().map(candle_to_update).collect();
        state.live.seed(symbol, updates);
        info!(
            symbol = %symbol,
            points = state.live.data_count(symbol),
            "live buffer seeded from daily history"
        );
    }

    state.increment_version();
}

// =============================================================================
// Unit Tests
// =============================================================================
