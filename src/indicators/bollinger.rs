// =============================================================================
// Bollinger Bands and rolling dispersion
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ). The band position of a price is its
// normalised location inside the channel: 0 at the lower band, 1 at the
// upper band.

/// Mean and population standard deviation of the trailing `period` values.
///
/// Returns `None` when `period` is zero, the slice is shorter than `period`,
/// or either statistic is non-finite.
pub fn rolling_mean_std(closes: &[f64], period: usize) -> Option<(f64, f64)> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    (mean.is_finite() && std_dev.is_finite()).then_some((mean, std_dev))
}

/// Result of a Bollinger Band calculation.
#[derive(Debug, Clone)]
pub struct BollingerResult {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerResult {
    /// Normalised position of `close` within the channel. 0.5 when the
    /// bands have collapsed (flat window); values outside [0, 1] mean the
    /// price escaped the channel.
    pub fn position(&self, close: f64) -> f64 {
        let span = self.upper - self.lower;
        if span == 0.0 {
            return 0.5;
        }
        (close - self.lower) / span
    }
}

/// Calculate Bollinger Bands over the trailing `period` closes.
///
/// Returns `None` when:
/// - Fewer than `period` data points.
/// - The middle band is zero or non-finite (degenerate input).
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerResult> {
    let (middle, std_dev) = rolling_mean_std(closes, period)?;
    if middle == 0.0 {
        return None;
    }

    Some(BollingerResult {
        upper: middle + num_std * std_dev,
        middle,
        lower: middle - num_std * std_dev,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_stats_basic() {
        let closes = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let (mean, std_dev) = rolling_mean_std(&closes, 8).unwrap();
        assert!((mean - 5.0).abs() < 1e-10);
        assert!((std_dev - 2.0).abs() < 1e-10);
    }

    #[test]
    fn rolling_stats_uses_trailing_window() {
        let closes = vec![100.0, 100.0, 1.0, 3.0];
        let (mean, _) = rolling_mean_std(&closes, 2).unwrap();
        assert!((mean - 2.0).abs() < 1e-10);
    }

    #[test]
    fn rolling_stats_insufficient_data() {
        assert!(rolling_mean_std(&[1.0, 2.0], 3).is_none());
        assert!(rolling_mean_std(&[1.0], 0).is_none());
    }

    #[test]
    fn bollinger_basic() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let bb = calculate_bollinger(&closes, 20, 2.0).unwrap();
        assert!(bb.upper > bb.middle);
        assert!(bb.lower < bb.middle);
    }

    #[test]
    fn bollinger_insufficient_data() {
        let closes = vec![1.0, 2.0, 3.0];
        assert!(calculate_bollinger(&closes, 20, 2.0).is_none());
    }

    #[test]
    fn position_inside_and_outside_the_channel() {
        let bb = BollingerResult {
            upper: 110.0,
            middle: 100.0,
            lower: 90.0,
        };
        assert!((bb.position(90.0) - 0.0).abs() < 1e-10);
        assert!((bb.position(100.0) - 0.5).abs() < 1e-10);
        assert!((bb.position(110.0) - 1.0).abs() < 1e-10);
        assert!(bb.position(120.0) > 1.0);
    }

    #[test]
    fn position_on_collapsed_bands_is_neutral() {
        let closes = vec![100.0; 20];
        let bb = calculate_bollinger(&closes, 20, 2.0).unwrap();
        assert!((bb.position(100.0) - 0.5).abs() < 1e-10);
    }
}
