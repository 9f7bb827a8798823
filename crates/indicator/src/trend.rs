//! Trend strength over a lookback window.

use rust_decimal::Decimal;

/// Directional persistence of an HMA series over the last `lookback` steps.
///
/// Returns a value in [-1, 1]: +1 when every step rose, -1 when every step
/// fell, 0 for a flat or balanced window. `None` when the window contains
/// undefined HMA values or fewer than `lookback + 1` points.
pub fn trend_strength(hma: &[Option<Decimal>], lookback: usize) -> Option<Decimal> {
    if lookback == 0 || hma.len() < lookback + 1 {
        return None;
    }

    let window = &hma[hma.len() - lookback - 1..];
    let mut rising = 0i64;
    let mut falling = 0i64;

    for pair in window.windows(2) {
        let (prev, next) = (pair[0]?, pair[1]?);
        if next > prev {
            rising += 1;
        } else if next < prev {
            falling += 1;
        }
    }

    Some(Decimal::from(rising - falling) / Decimal::from(lookback as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn series(values: &[i64]) -> Vec<Option<Decimal>> {
        values.iter().map(|v| Some(Decimal::from(*v))).collect()
    }

    #[test]
    fn test_full_uptrend() {
        let hma = series(&[1, 2, 3, 4, 5]);
        assert_eq!(trend_strength(&hma, 4), Some(dec!(1)));
    }

    #[test]
    fn test_full_downtrend() {
        let hma = series(&[5, 4, 3, 2, 1]);
        assert_eq!(trend_strength(&hma, 4), Some(dec!(-1)));
    }

    #[test]
    fn test_flat_series() {
        let hma = series(&[3, 3, 3, 3, 3]);
        assert_eq!(trend_strength(&hma, 4), Some(dec!(0)));
    }

    #[test]
    fn test_mixed_window() {
        // 3 rises, 1 fall over 4 steps -> (3 - 1) / 4 = 0.5
        let hma = series(&[1, 2, 3, 2, 4]);
        assert_eq!(trend_strength(&hma, 4), Some(dec!(0.5)));
    }

    #[test]
    fn test_insufficient_history() {
        let hma = series(&[1, 2, 3]);
        assert_eq!(trend_strength(&hma, 4), None);
        assert_eq!(trend_strength(&hma, 0), None);
    }

    #[test]
    fn test_undefined_values_in_window() {
        let mut hma = series(&[1, 2, 3, 4, 5]);
        hma[2] = None;
        assert_eq!(trend_strength(&hma, 4), None);
    }
}
