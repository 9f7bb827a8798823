use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Bar resolution for historical candle requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    OneMinute,
    FiveMinute,
    FifteenMinute,
    Daily,
    Weekly,
}

impl Resolution {
    /// API string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinute => "5m",
            Self::FifteenMinute => "15m",
            Self::Daily => "1d",
            Self::Weekly => "1w",
        }
    }

    /// Bar duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        match self {
            Self::OneMinute => 60_000,
            Self::FiveMinute => 300_000,
            Self::FifteenMinute => 900_000,
            Self::Daily => 86_400_000,
            Self::Weekly => 604_800_000,
        }
    }

    /// Whether this resolution produces intraday bars.
    pub fn is_intraday(&self) -> bool {
        matches!(self, Self::OneMinute | Self::FiveMinute | Self::FifteenMinute)
    }
}

/// A live quote for a single instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    /// Last traded price.
    pub ltp: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    pub change_pct: Decimal,
    pub timestamp_ms: i64,
}

/// A single OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp_ms: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

/// Extract the close series from a slice of candles.
pub fn closes(candles: &[Candle]) -> Vec<Decimal> {
    candles.iter().map(|c| c.close).collect()
}
