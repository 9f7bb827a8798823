//! Hull Moving Average.
//!
//! For period n over closes:
//!   raw  = 2 * WMA(n/2, integer division) - WMA(n)
//!   HMA  = WMA(raw, round(sqrt(n)))
//!
//! The first defined HMA value needs `n + round(sqrt(n)) - 2` prior points.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::wma::{wma_latest, wma_series};

/// Smoothing period for the final WMA pass: round(sqrt(period)), at least 1.
pub fn smoothing_period(period: usize) -> usize {
    ((period as f64).sqrt().round() as usize).max(1)
}

fn half_period(period: usize) -> usize {
    (period / 2).max(1)
}

/// Compute the full HMA series for one period.
///
/// Output has the same length as the input; positions before warm-up are `None`.
pub fn hma_series(closes: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    if period == 0 {
        return vec![None; closes.len()];
    }

    let two = Decimal::from(2);
    let half = wma_series(closes, half_period(period));
    let full = wma_series(closes, period);

    let raw: Vec<Option<Decimal>> = half
        .iter()
        .zip(full.iter())
        .map(|(h, f)| match (h, f) {
            (Some(h), Some(f)) => Some(two * h - f),
            _ => None,
        })
        .collect();

    let smooth = smoothing_period(period);
    let mut out = Vec::with_capacity(closes.len());
    let divisor = Decimal::from((smooth * (smooth + 1)) as u64 / 2);

    for i in 0..raw.len() {
        if i + 1 < smooth {
            out.push(None);
            continue;
        }

        let window = &raw[i + 1 - smooth..=i];
        if window.iter().any(|v| v.is_none()) {
            out.push(None);
            continue;
        }

        let mut weighted_sum = Decimal::ZERO;
        for (j, value) in window.iter().enumerate() {
            weighted_sum += Decimal::from(j as u64 + 1) * value.unwrap();
        }
        out.push(Some(weighted_sum / divisor));
    }

    out
}

/// Compute only the most recent HMA value.
///
/// Cheaper rolling path: only the last `round(sqrt(n))` raw values are built,
/// instead of the full series.
pub fn hma_latest(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 {
        return None;
    }

    let smooth = smoothing_period(period);
    let len = closes.len();
    if len < period + smooth - 1 {
        return None;
    }

    let two = Decimal::from(2);
    let half = half_period(period);

    let mut raw = Vec::with_capacity(smooth);
    for idx in len - smooth..len {
        let upto = &closes[..=idx];
        let h = wma_latest(upto, half)?;
        let f = wma_latest(upto, period)?;
        raw.push(two * h - f);
    }

    wma_latest(&raw, smooth)
}

/// Compute the latest HMA for several periods over one close series.
///
/// Periods with insufficient history map to `None`.
pub fn hma_multi(closes: &[Decimal], periods: &[usize]) -> BTreeMap<usize, Option<Decimal>> {
    periods
        .iter()
        .map(|&p| (p, hma_latest(closes, p)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ramp(n: usize) -> Vec<Decimal> {
        (1..=n).map(|i| Decimal::from(i as u64)).collect()
    }

    #[test]
    fn test_smoothing_period() {
        assert_eq!(smoothing_period(4), 2);
        assert_eq!(smoothing_period(9), 3);
        assert_eq!(smoothing_period(10), 3);
        assert_eq!(smoothing_period(16), 4);
        assert_eq!(smoothing_period(1), 1);
    }

    #[test]
    fn test_hma_undefined_below_warmup() {
        let closes = ramp(5);
        // period 9 needs at least 9 + 3 - 1 = 11 points
        assert_eq!(hma_latest(&closes, 9), None);

        let series = hma_series(&closes, 9);
        assert!(series.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_hma_latest_matches_series() {
        let closes: Vec<Decimal> = [
            100.0, 101.5, 99.25, 102.0, 103.75, 102.5, 104.0, 105.25, 104.5, 106.0, 107.25,
            106.75, 108.0, 109.5, 108.75, 110.0,
        ]
        .iter()
        .map(|v| Decimal::try_from(*v).unwrap())
        .collect();

        let series = hma_series(&closes, 9);
        let latest = hma_latest(&closes, 9);

        assert_eq!(*series.last().unwrap(), latest);
        assert!(latest.is_some());
    }

    #[test]
    fn test_hma_converges_on_constant_series() {
        let closes = vec![dec!(250); 40];
        let hma = hma_latest(&closes, 9).unwrap();
        assert_eq!(hma, dec!(250));
    }

    #[test]
    fn test_hma_tracks_ramp_with_less_lag_than_sma() {
        // On a monotonic ramp the HMA should sit closer to the latest price
        // than an equal-period simple average does.
        let closes = ramp(40);
        let period = 9;

        let hma = hma_latest(&closes, period).unwrap();

        let sma: Decimal = closes[closes.len() - period..]
            .iter()
            .copied()
            .sum::<Decimal>()
            / Decimal::from(period as u64);

        let last = *closes.last().unwrap();
        let hma_lag = (last - hma).abs();
        let sma_lag = (last - sma).abs();

        assert!(
            hma_lag < sma_lag,
            "hma lag {} should be below sma lag {}",
            hma_lag,
            sma_lag
        );
    }

    #[test]
    fn test_hma_multi() {
        let closes = ramp(40);
        let result = hma_multi(&closes, &[9, 16, 100]);

        assert!(result[&9].is_some());
        assert!(result[&16].is_some());
        // Not enough history for period 100
        assert_eq!(result[&100], None);
        assert_eq!(result[&9], hma_latest(&closes, 9));
    }

    #[test]
    fn test_hma_period_zero() {
        let closes = ramp(10);
        assert_eq!(hma_latest(&closes, 0), None);
    }
}
