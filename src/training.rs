// =============================================================================
// Training dataset construction
// =============================================================================
//
// Slides fixed-size windows over a historical series and pairs each window's
// feature vector with the realised forward return as the label. Window size,
// prediction horizon and quality gates vary per timeframe; a series that
// cannot produce enough quality samples yields an empty dataset rather than
// an error.
// =============================================================================

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::binance::KlineSource;
use crate::features::extract_features;
use crate::history::HistoryEngine;
use crate::types::{Candle, Timeframe};

/// Timeframes the training pipeline covers, shortest bucket first.
pub const TRAINING_TIMEFRAMES: [Timeframe; 5] = [
    Timeframe::Hour1,
    Timeframe::Hour4,
    Timeframe::Day1,
    Timeframe::Week1,
    Timeframe::Month1,
];

/// One labelled training sample. `label` is the relative close change
/// `future_offset` buckets after the window.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSample {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: i64,
    pub features: Vec<f64>,
    pub label: f64,
}

// -----------------------------------------------------------------------------
// Per-timeframe tables
// -----------------------------------------------------------------------------

/// Series length below which no dataset is attempted.
fn min_data_points(timeframe: Timeframe) -> usize {
    match timeframe {
        Timeframe::Hour1 | Timeframe::Hour4 => 500,
        Timeframe::Day1 => 400,
        Timeframe::Week1 => 200,
        _ => 100,
    }
}

/// Candles per feature window.
fn window_size(timeframe: Timeframe) -> usize {
    match timeframe {
        Timeframe::Hour4 | Timeframe::Week1 => 40,
        Timeframe::Month1 => 30,
        _ => 50,
    }
}

/// Buckets between the window end and the label close.
fn future_offset(timeframe: Timeframe) -> usize {
    match timeframe {
        Timeframe::Hour1 => 24,
        Timeframe::Hour4 => 12,
        Timeframe::Day1 => 7,
        Timeframe::Week1 => 4,
        Timeframe::Month1 => 3,
        _ => 1,
    }
}

/// Samples whose |label| reaches this bound are treated as outliers and
/// dropped.
fn max_label_magnitude(timeframe: Timeframe) -> f64 {
    match timeframe {
        Timeframe::Day1 => 0.3,
        Timeframe::Month1 => 0.8,
        _ => 0.5,
    }
}

/// A dataset below this size is discarded wholesale.
fn min_samples(timeframe: Timeframe) -> usize {
    match timeframe {
        Timeframe::Hour1 | Timeframe::Hour4 => 100,
        Timeframe::Day1 => 80,
        Timeframe::Week1 => 50,
        Timeframe::Month1 => 30,
        _ => 50,
    }
}

// -----------------------------------------------------------------------------
// Dataset construction
// -----------------------------------------------------------------------------

/// Build the labelled dataset for one (symbol, timeframe) series.
///
/// Returns an empty vector when the series is under the timeframe's minimum
/// length or fewer than the minimum number of quality samples survive the
/// outlier filter.
pub fn build_dataset(symbol: &str, timeframe: Timeframe, series: &[Candle]) -> Vec<TrainingSample> {
    let minimum = min_data_points(timeframe);
    if series.len() < minimum {
        debug!(
            symbol,
            timeframe = %timeframe,
            points = series.len(),
            required = minimum,
            "series too short for training"
        );
        return Vec::new();
    }

    let window = window_size(timeframe);
    let offset = future_offset(timeframe);
    let max_label = max_label_magnitude(timeframe);

    let mut samples = Vec::new();
    for i in window..series.len() - offset {
        let features = match extract_features(&series[i - window..i]) {
            Some(features) => features,
            None => continue,
        };

        let current = series[i].close;
        if current == 0.0 {
            continue;
        }
        let label = (series[i + offset].close - current) / current;
        if label.abs() >= max_label {
            continue;
        }

        samples.push(TrainingSample {
            symbol: symbol.to_string(),
            timeframe,
            timestamp: series[i].timestamp,
            features,
            label,
        });
    }

    let required = min_samples(timeframe);
    if samples.len() < required {
        warn!(
            symbol,
            timeframe = %timeframe,
            samples = samples.len(),
            required,
            "not enough quality samples, discarding dataset"
        );
        return Vec::new();
    }

    info!(
        symbol,
        timeframe = %timeframe,
        samples = samples.len(),
        "training dataset built"
    );
    samples
}

/// One full collection pass over every symbol and training timeframe.
///
/// Pulls each series through the engine's training path (deep-fetching
/// undersized ones), builds the dataset and moves on past individual
/// failures. Returns how many datasets were built and how many pairs were
/// skipped.
pub async fn collect_all<S: KlineSource>(
    engine: &HistoryEngine<S>,
    symbols: &[String],
) -> (usize, usize) {
    let mut built = 0usize;
    let mut skipped = 0usize;

    for symbol in symbols {
        for timeframe in TRAINING_TIMEFRAMES {
            let series = engine.get_training_data(symbol, timeframe).await;
            let samples = build_dataset(symbol, timeframe, &series);
            if samples.is_empty() {
                skipped += 1;
            } else {
                built += 1;
            }
        }
    }

    info!(built, skipped, "training collection pass finished");
    (built, skipped)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: i64 = 3_600_000;

    /// Gently oscillating series long enough for any timeframe table.
    fn series_of(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + 5.0 * ((i as f64) * 0.31).sin();
                Candle {
                    symbol: "BTC".to_string(),
                    timestamp: i as i64 * HOUR_MS,
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 10.0 + (i % 7) as f64,
                }
            })
            .collect()
    }

    #[test]
    fn short_series_yields_no_dataset() {
        let series = series_of(100);
        assert!(build_dataset("BTC", Timeframe::Hour1, &series).is_empty());
    }

    #[test]
    fn dataset_labels_are_forward_returns() {
        let series = series_of(600);
        let samples = build_dataset("BTC", Timeframe::Hour1, &series);
        assert!(samples.len() >= min_samples(Timeframe::Hour1));

        let window = window_size(Timeframe::Hour1);
        let offset = future_offset(Timeframe::Hour1);
        let first = &samples[0];
        // The first surviving sample anchors at the first window end.
        assert_eq!(first.timestamp, series[window].timestamp);
        let expected = (series[window + offset].close - series[window].close)
            / series[window].close;
        assert!((first.label - expected).abs() < 1e-12);
        assert_eq!(first.features.len(), crate::features::FEATURE_COUNT);
        assert_eq!(first.timeframe, Timeframe::Hour1);
    }

    #[test]
    fn outlier_labels_are_filtered() {
        let mut series = series_of(600);
        // Spike one close so the sample anchored 24 buckets earlier sees a
        // label far past the 0.5 filter.
        let spike_at = 300;
        series[spike_at].close = 1_000.0;
        let spiked_anchor = series[spike_at - future_offset(Timeframe::Hour1)].timestamp;

        let samples = build_dataset("BTC", Timeframe::Hour1, &series);
        assert!(!samples.is_empty());
        assert!(samples.iter().all(|s| s.timestamp != spiked_anchor));
        assert!(samples
            .iter()
            .all(|s| s.label.abs() < max_label_magnitude(Timeframe::Hour1)));
    }

    #[test]
    fn monthly_table_uses_its_own_gates() {
        // 100 monthly points clear the minimum; windows of 30 slide up to
        // the 3-bucket horizon.
        let series = series_of(100);
        let samples = build_dataset("BTC", Timeframe::Month1, &series);
        assert!(!samples.is_empty());
        assert_eq!(
            samples.len(),
            100 - window_size(Timeframe::Month1) - future_offset(Timeframe::Month1)
        );
    }

    #[test]
    fn every_training_timeframe_has_consistent_tables() {
        for timeframe in TRAINING_TIMEFRAMES {
            // The minimum series length always leaves room for at least one
            // full window plus the label horizon.
            assert!(min_data_points(timeframe) > window_size(timeframe) + future_offset(timeframe));
            assert!(max_label_magnitude(timeframe) > 0.0);
            assert!(min_samples(timeframe) > 0);
        }
    }
}
