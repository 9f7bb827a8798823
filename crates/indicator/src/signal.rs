//! Crossover signal classification.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-bar classification of price against its HMA.
///
/// `Buy`/`Sell` fire only on the bar where the crossover first occurs;
/// subsequent bars report `Bullish`/`Bearish` while the condition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalClass {
    /// Warm-up or no prior bar to compare against.
    Neutral,
    /// Price crossed above the HMA on this bar.
    Buy,
    /// Price remains above the HMA.
    Bullish,
    /// Price crossed below the HMA on this bar.
    Sell,
    /// Price remains below the HMA.
    Bearish,
}

impl SignalClass {
    /// Whether this is the bar a crossover occurred on.
    pub fn is_crossover(&self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }
}

/// Classify a single bar given the previous bar's close and HMA.
pub fn classify_latest(
    prev_close: Option<Decimal>,
    close: Decimal,
    prev_hma: Option<Decimal>,
    hma: Option<Decimal>,
) -> SignalClass {
    let (Some(prev_close), Some(prev_hma), Some(hma)) = (prev_close, prev_hma, hma) else {
        return SignalClass::Neutral;
    };

    let above = close > hma;
    let was_above = prev_close > prev_hma;

    match (was_above, above) {
        (false, true) => SignalClass::Buy,
        (true, true) => SignalClass::Bullish,
        (true, false) => SignalClass::Sell,
        (false, false) => SignalClass::Bearish,
    }
}

/// Classify every bar of a close series against its HMA series.
///
/// The two slices must have equal length; the output matches that length.
pub fn classify_series(closes: &[Decimal], hma: &[Option<Decimal>]) -> Vec<SignalClass> {
    debug_assert_eq!(closes.len(), hma.len());

    let mut out = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        if i == 0 {
            out.push(SignalClass::Neutral);
            continue;
        }
        out.push(classify_latest(
            Some(closes[i - 1]),
            closes[i],
            hma[i - 1],
            hma[i],
        ));
    }
    out
}
