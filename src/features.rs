// =============================================================================
// Feature extraction for training windows
// =============================================================================
//
// Turns one window of candles into the fixed 15-value vector the model
// training pipeline consumes. All values derive from the closes and volumes
// of the window alone; a window shorter than the longest lookback (EMA-26)
// yields no vector, as does any window that produces a non-finite value.
// =============================================================================

use crate::indicators::bollinger::{calculate_bollinger, rolling_mean_std};
use crate::indicators::ema::{current_ema, sma};
use crate::indicators::roc::current_roc;
use crate::indicators::rsi::current_rsi;
use crate::types::Candle;

/// Length of every extracted feature vector.
pub const FEATURE_COUNT: usize = 15;

/// Smallest window the extractor accepts, set by the EMA-26 lookback.
pub const MIN_WINDOW: usize = 26;

/// Extract the feature vector for one candle window, oldest first.
pub fn extract_features(window: &[Candle]) -> Option<Vec<f64>> {
    if window.len() < MIN_WINDOW {
        return None;
    }

    let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = window.iter().map(|c| c.volume).collect();
    let last = closes[closes.len() - 1];

    let ema12 = current_ema(&closes, 12)?;
    let ema26 = current_ema(&closes, 26)?;
    let (window_mean, window_std) = rolling_mean_std(&closes, closes.len())?;

    let features = vec![
        // 5- and 20-period simple moving averages.
        sma(&closes, 5)?,
        sma(&closes, 20)?,
        // 12-period exponential moving average.
        ema12,
        // 14-period RSI; neutral when the series is too short to score.
        current_rsi(&closes, 14).unwrap_or(50.0),
        // MACD line.
        ema12 - ema26,
        // 20-period volatility (population std-dev of closes).
        rolling_mean_std(&closes, 20)?.1,
        // 10-step absolute momentum, same base close as the ROC below.
        last - closes[closes.len() - 1 - 10],
        // 10-step rate of change, percent.
        current_roc(&closes, 10)?,
        // Last volume against the mean of the preceding ones.
        volume_strength(&volumes),
        // Z-score of the last close within the window.
        if window_std == 0.0 {
            0.0
        } else {
            (last - window_mean) / window_std
        },
        // Trend strength: short SMA against the long SMA.
        trend_strength(&closes)?,
        // Position of the last close relative to the window mean.
        if window_mean == 0.0 {
            0.0
        } else {
            (last - window_mean) / window_mean
        },
        // Position inside the 2-sigma Bollinger channel.
        calculate_bollinger(&closes, 20, 2.0)
            .map(|bb| bb.position(last))
            .unwrap_or(0.5),
        // Change of the return between the last two steps.
        price_acceleration(&closes),
        // Volume-weighted average return across the window.
        volume_price_trend(&volumes, &closes),
    ];

    features.iter().all(|f| f.is_finite()).then_some(features)
}

fn trend_strength(closes: &[f64]) -> Option<f64> {
    let short = sma(closes, 20)?;
    let long = sma(closes, closes.len().min(50))?;
    if long == 0.0 {
        Some(0.0)
    } else {
        Some((short - long) / long)
    }
}

fn volume_strength(volumes: &[f64]) -> f64 {
    if volumes.len() < 2 {
        return 0.5;
    }
    let current = volumes[volumes.len() - 1];
    let rest = &volumes[..volumes.len() - 1];
    let avg = rest.iter().sum::<f64>() / rest.len() as f64;
    if avg == 0.0 {
        0.5
    } else {
        current / avg
    }
}

fn price_acceleration(closes: &[f64]) -> f64 {
    let n = closes.len();
    if n < 3 {
        return 0.0;
    }
    let (oldest, middle, newest) = (closes[n - 3], closes[n - 2], closes[n - 1]);
    if oldest == 0.0 || middle == 0.0 {
        return 0.0;
    }
    let change_now = (newest - middle) / middle;
    let change_prev = (middle - oldest) / oldest;
    change_now - change_prev
}

fn volume_price_trend(volumes: &[f64], closes: &[f64]) -> f64 {
    if closes.len() < 2 {
        return 0.0;
    }
    let mut volume_sum = 0.0;
    let mut weighted = 0.0;
    for i in 1..closes.len() {
        let prev = closes[i - 1];
        if prev == 0.0 {
            continue;
        }
        let change = (closes[i] - prev) / prev;
        volume_sum += volumes[i];
        weighted += change * volumes[i];
    }
    if volume_sum == 0.0 {
        0.0
    } else {
        weighted / volume_sum
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn candle(timestamp: i64, close: f64, volume: f64) -> Candle {
        Candle {
            symbol: "BTC".to_string(),
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    fn window_of(closes: &[f64], volume: f64) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| candle(i as i64, c, volume))
            .collect()
    }

    #[test]
    fn short_windows_are_rejected() {
        let window = window_of(&vec![100.0; MIN_WINDOW - 1], 10.0);
        assert!(extract_features(&window).is_none());
        assert!(extract_features(&[]).is_none());
    }

    #[test]
    fn flat_window_produces_the_neutral_vector() {
        let window = window_of(&vec![100.0; 30], 10.0);
        let features = extract_features(&window).unwrap();
        assert_eq!(features.len(), FEATURE_COUNT);

        let expected = [
            100.0, // SMA5
            100.0, // SMA20
            100.0, // EMA12
            50.0,  // RSI: no movement
            0.0,   // MACD
            0.0,   // volatility
            0.0,   // momentum
            0.0,   // ROC
            1.0,   // volume strength: constant volume
            0.0,   // z-score
            0.0,   // trend strength
            0.0,   // mean position
            0.5,   // Bollinger position on collapsed bands
            0.0,   // acceleration
            0.0,   // volume-price trend
        ];
        for (i, (&got, &want)) in features.iter().zip(expected.iter()).enumerate() {
            assert!((got - want).abs() < 1e-10, "feature {i}: got {got}, want {want}");
        }
    }

    #[test]
    fn rising_window_has_bullish_signals() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let window = window_of(&closes, 10.0);
        let features = extract_features(&window).unwrap();

        // RSI pinned at 100 on monotone gains.
        assert!((features[3] - 100.0).abs() < 1e-10);
        // Momentum is the 10-step close difference.
        assert!((features[6] - 10.0).abs() < 1e-10);
        // ROC, z-score, trend strength and mean position are all positive.
        assert!(features[7] > 0.0);
        assert!(features[9] > 0.0);
        assert!(features[10] > 0.0);
        assert!(features[11] > 0.0);
        // The last close sits in the upper half of the Bollinger channel.
        assert!(features[12] > 0.5);
    }

    #[test]
    fn momentum_and_roc_span_the_same_lookback() {
        let closes: Vec<f64> = (0..30).map(|i| 50.0 + (i as f64) * 2.5).collect();
        let window = window_of(&closes, 10.0);
        let features = extract_features(&window).unwrap();

        // Both features measure the last close against the close ten steps
        // back; one absolute, one percent.
        let last = closes[closes.len() - 1];
        let base = closes[closes.len() - 1 - 10];
        assert!((features[6] - (last - base)).abs() < 1e-10);
        assert!((features[7] - (last - base) / base * 100.0).abs() < 1e-10);
    }

    #[test]
    fn volume_weighted_trend_follows_the_heavy_moves() {
        // An up move on heavy volume followed by a down move on light
        // volume nets out positive.
        let window = vec![
            vec![candle(0, 100.0, 1.0)],
            vec![candle(1, 110.0, 100.0)],
            vec![candle(2, 105.0, 1.0)],
        ]
        .concat();
        assert!(volume_price_trend(
            &window.iter().map(|c| c.volume).collect::<Vec<_>>(),
            &window.iter().map(|c| c.close).collect::<Vec<_>>(),
        ) > 0.0);
    }

    #[test]
    fn noisy_window_stays_finite() {
        let closes: Vec<f64> = (0..50)
            .map(|i| 100.0 + 10.0 * ((i as f64) * 0.7).sin())
            .collect();
        let window = window_of(&closes, 25.0);
        let features = extract_features(&window).unwrap();
        assert_eq!(features.len(), FEATURE_COUNT);
        assert!(features.iter().all(|f| f.is_finite()));
    }
}
