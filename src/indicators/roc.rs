// =============================================================================
// Rate of Change (ROC)
// =============================================================================
//
// ROC measures the percentage change in price over a look-back period:
//   ROC = ((close - close_n) / close_n) * 100
//
// Positive ROC indicates upward momentum; negative indicates downward.

/// Calculate the Rate of Change (ROC) for the given closing prices and period.
///
/// Returns a vector of ROC values, one per close starting at index `period`.
/// A zero base price yields 0.0 for that element.
pub fn calculate_roc(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(closes.len() - period);
    for i in period..closes.len() {
        let base = closes[i - period];
        if base == 0.0 {
            result.push(0.0);
        } else {
            result.push(((closes[i] - base) / base) * 100.0);
        }
    }
    result
}

/// Return the most recent ROC value.
pub fn current_roc(closes: &[f64], period: usize) -> Option<f64> {
    calculate_roc(closes, period).last().copied()
}
