//! Weighted Moving Average.
//!
//! WMA(k) over the last k points weights the i-th most recent point with
//! weight i (most recent = k), normalized by k(k+1)/2. The first (k-1)
//! positions of a series are undefined.

use rust_decimal::Decimal;

/// Compute the WMA of the last `period` values, or `None` with insufficient data.
pub fn wma_latest(values: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || values.len() < period {
        return None;
    }

    let window = &values[values.len() - period..];
    let mut weighted_sum = Decimal::ZERO;
    for (i, value) in window.iter().enumerate() {
        weighted_sum += Decimal::from(i as u64 + 1) * value;
    }

    let divisor = Decimal::from((period * (period + 1)) as u64 / 2);
    Some(weighted_sum / divisor)
}

/// Compute the full WMA series in O(n) using a sliding weighted window.
///
/// Output has the same length as the input; positions before warm-up are `None`.
pub fn wma_series(values: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let divisor = Decimal::from((period * (period + 1)) as u64 / 2);
    let period_dec = Decimal::from(period as u64);

    let mut out = Vec::with_capacity(values.len());
    let mut weighted_sum = Decimal::ZERO;
    let mut window_sum = Decimal::ZERO;

    for (i, value) in values.iter().enumerate() {
        if i < period {
            let weight = Decimal::from(i as u64 + 1);
            weighted_sum += weight * value;
            window_sum += value;
        } else {
            // Slide: every retained point loses one weight step, the new
            // point enters at full weight.
            weighted_sum += period_dec * value - window_sum;
            window_sum += value - values[i - period];
        }

        if i + 1 >= period {
            out.push(Some(weighted_sum / divisor));
        } else {
            out.push(None);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_wma_latest_insufficient_data() {
        assert_eq!(wma_latest(&[dec!(10), dec!(20)], 3), None);
        assert_eq!(wma_latest(&[], 1), None);
        assert_eq!(wma_latest(&[dec!(10)], 0), None);
    }

    #[test]
    fn test_wma_latest_known_value() {
        // (1*10 + 2*20 + 3*30) / 6 = 140/6
        let values = [dec!(10), dec!(20), dec!(30)];
        let expected = dec!(140) / dec!(6);
        assert_eq!(wma_latest(&values, 3), Some(expected));
    }

    #[test]
    fn test_wma_latest_uses_most_recent_window() {
        let values = [dec!(5), dec!(10), dec!(20), dec!(30)];
        // Window is [10, 20, 30], same as previous test
        let expected = dec!(140) / dec!(6);
        assert_eq!(wma_latest(&values, 3), Some(expected));
    }

    #[test]
    fn test_wma_series_warmup() {
        let values = [dec!(10), dec!(20), dec!(30), dec!(40), dec!(50)];
        let series = wma_series(&values, 3);

        assert_eq!(series.len(), 5);
        assert!(series[0].is_none());
        assert!(series[1].is_none());
        assert!(series[2].is_some());
        assert!(series[3].is_some());
        assert!(series[4].is_some());
    }

    #[test]
    fn test_wma_series_matches_latest() {
        let values = [
            dec!(100.5),
            dec!(101.25),
            dec!(99.75),
            dec!(102.0),
            dec!(103.5),
            dec!(102.25),
        ];
        let series = wma_series(&values, 4);

        for i in 3..values.len() {
            assert_eq!(series[i], wma_latest(&values[..=i], 4), "index {}", i);
        }
    }

    #[test]
    fn test_wma_constant_series() {
        let values = [dec!(100); 6];
        let series = wma_series(&values, 4);
        assert_eq!(series[5], Some(dec!(100)));
    }

    #[test]
    fn test_wma_period_one_is_identity() {
        let values = [dec!(10), dec!(20), dec!(30)];
        let series = wma_series(&values, 1);
        assert_eq!(
            series,
            vec![Some(dec!(10)), Some(dec!(20)), Some(dec!(30))]
        );
    }

    #[test]
    fn test_wma_period_zero() {
        let values = [dec!(10), dec!(20)];
        assert_eq!(wma_series(&values, 0), vec![None, None]);
    }
}
