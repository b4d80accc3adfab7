//! Wilder-smoothed RSI over a window of closing prices

/// Compute the RSI for the given closes, oldest-first.
///
/// The first `period` price changes seed the average gain and loss with a
/// simple mean; every later change folds in with Wilder's smoothing
/// `avg = (avg * (period - 1) + x) / period`. Returns `None` when fewer
/// than `period + 1` closes are available.
///
/// A window with no losses reads 100, a window with no gains reads 0, in
/// that order (so a perfectly flat window reads 100).
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }
    let p = period as f64;

    let mut sum_gain = 0.0;
    let mut sum_loss = 0.0;
    for pair in closes[..=period].windows(2) {
        let change = pair[1] - pair[0];
        sum_gain += change.max(0.0);
        sum_loss += (-change).max(0.0);
    }
    let mut avg_gain = sum_gain / p;
    let mut avg_loss = sum_loss / p;

    for pair in closes[period..].windows(2) {
        let change = pair[1] - pair[0];
        avg_gain = (avg_gain * (p - 1.0) + change.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-change).max(0.0)) / p;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    if avg_gain == 0.0 {
        return Some(0.0);
    }
    Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
}
