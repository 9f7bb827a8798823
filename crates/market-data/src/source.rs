//! Quote source seam.

use async_trait::async_trait;
use model::{Candle, Quote, Resolution};

use crate::error::MarketDataError;

/// External quote source.
///
/// Implementations perform the actual I/O; the `MarketData` service owns
/// caching, budgeting and retry around them.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch live quotes for a batch of instruments.
    async fn get_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>, MarketDataError>;

    /// Fetch historical candles for one instrument.
    async fn get_history(
        &self,
        symbol: &str,
        resolution: Resolution,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<Candle>, MarketDataError>;
}
