//! Historical-simulation Value at Risk

/// Slack so that e.g. `10 * (1 - 0.9)` lands on index 1, not 0
const INDEX_EPSILON: f64 = 1e-9;

/// Value at Risk from a sample of historical returns.
///
/// Sorts the returns ascending, takes the one at index
/// `floor(n * (1 - confidence))` (clamped to the sample) and reports the
/// loss it implies on `portfolio_value`. An empty sample has no risk.
pub fn historical_var(returns: &[f64], confidence: f64, portfolio_value: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }

    let mut sorted = returns.to_vec();
    sorted.sort_by(f64::total_cmp);

    let raw = (sorted.len() as f64 * (1.0 - confidence) + INDEX_EPSILON).floor();
    let index = if raw.is_nan() || raw < 0.0 {
        0
    } else {
        (raw as usize).min(sorted.len() - 1)
    };

    -sorted[index] * portfolio_value
}
