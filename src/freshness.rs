// =============================================================================
// Freshness policy
// =============================================================================
//
// Per-timeframe rules for "how old is too old" and "how much data is
// enough". Ages gate whether the durable copy may be served as-is or a
// refresh is attempted first; required points are the deep-fetch and
// training targets for each bucket width.
// =============================================================================

use std::time::Duration;

use crate::types::{Candle, Timeframe};

/// Maximum acceptable age of the durable copy before a refresh is attempted.
pub fn max_age_hours(timeframe: Timeframe) -> u64 {
    match timeframe {
        Timeframe::Min1 => 1,
        Timeframe::Hour1 => 6,
        Timeframe::Hour4 => 24,
        Timeframe::Day1 => 24,
        Timeframe::Week1 => 168,
        Timeframe::Month1 => 24,
    }
}

/// Point target for deep fetches and training reads. Sized so each
/// timeframe spans a useful training history (2000 hourly buckets is ~83
/// days, 1460 daily buckets is four years).
pub fn required_points(timeframe: Timeframe) -> usize {
    match timeframe {
        Timeframe::Min1 => 100,
        Timeframe::Hour1 => 2000,
        Timeframe::Hour4 => 1000,
        Timeframe::Day1 => 1460,
        Timeframe::Week1 => 208,
        Timeframe::Month1 => 48,
    }
}

/// A missing durable copy (`age == None`) is always stale.
pub fn is_stale(age: Option<Duration>, timeframe: Timeframe) -> bool {
    match age {
        None => true,
        Some(age) => age > Duration::from_secs(max_age_hours(timeframe) * 3600),
    }
}

pub fn has_enough(series: &[Candle], requested: usize) -> bool {
    series.len() >= requested
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_table_matches_expected_windows() {
        assert_eq!(max_age_hours(Timeframe::Min1), 1);
        assert_eq!(max_age_hours(Timeframe::Hour1), 6);
        assert_eq!(max_age_hours(Timeframe::Hour4), 24);
        assert_eq!(max_age_hours(Timeframe::Day1), 24);
        assert_eq!(max_age_hours(Timeframe::Week1), 168);
        assert_eq!(max_age_hours(Timeframe::Month1), 24);
    }

    #[test]
    fn point_targets_match_expected_table() {
        assert_eq!(required_points(Timeframe::Hour1), 2000);
        assert_eq!(required_points(Timeframe::Hour4), 1000);
        assert_eq!(required_points(Timeframe::Day1), 1460);
        assert_eq!(required_points(Timeframe::Week1), 208);
        assert_eq!(required_points(Timeframe::Month1), 48);
        assert_eq!(required_points(Timeframe::Min1), 100);
    }

    #[test]
    fn missing_data_is_always_stale() {
        assert!(is_stale(None, Timeframe::Day1));
    }

    #[test]
    fn staleness_respects_the_age_boundary() {
        let just_under = Duration::from_secs(6 * 3600 - 1);
        let just_over = Duration::from_secs(6 * 3600 + 1);
        assert!(!is_stale(Some(just_under), Timeframe::Hour1));
        assert!(!is_stale(Some(Duration::from_secs(6 * 3600)), Timeframe::Hour1));
        assert!(is_stale(Some(just_over), Timeframe::Hour1));
    }

    #[test]
    fn has_enough_is_a_simple_length_check() {
        let series: Vec<Candle> = (0..30)
            .map(|i| Candle {
                symbol: "BTC".into(),
                timestamp: i * 1000,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 0.0,
            })
            .collect();
        assert!(has_enough(&series, 30));
        assert!(has_enough(&series, 10));
        assert!(!has_enough(&series, 31));
    }
}
