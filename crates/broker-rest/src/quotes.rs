//! Quote source over the broker's market-data endpoints.

use async_trait::async_trait;
use market_data::{MarketDataError, QuoteSource};
use model::{Candle, Quote, Resolution};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::http::{HttpClient, RestError};

/// Response from GET /md/v1/quotes.
#[derive(Debug, Deserialize)]
struct QuotesResponse {
    quotes: Vec<QuoteRow>,
}

#[derive(Debug, Deserialize)]
struct QuoteRow {
    symbol: String,
    #[serde(deserialize_with = "decimal_from_str")]
    ltp: Decimal,
    #[serde(deserialize_with = "decimal_from_str")]
    open: Decimal,
    #[serde(deserialize_with = "decimal_from_str")]
    high: Decimal,
    #[serde(deserialize_with = "decimal_from_str")]
    low: Decimal,
    #[serde(deserialize_with = "decimal_from_str")]
    close: Decimal,
    volume: u64,
    #[serde(rename = "changePct", deserialize_with = "decimal_from_str")]
    change_pct: Decimal,
    #[serde(rename = "timestamp")]
    timestamp_ms: i64,
}

impl From<QuoteRow> for Quote {
    fn from(row: QuoteRow) -> Self {
        Quote {
            symbol: row.symbol,
            ltp: row.ltp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            change_pct: row.change_pct,
            timestamp_ms: row.timestamp_ms,
        }
    }
}

/// Response from GET /md/v1/history.
#[derive(Debug, Deserialize)]
struct HistoryResponse {
    candles: Vec<CandleRow>,
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    #[serde(rename = "timestamp")]
    timestamp_ms: i64,
    #[serde(deserialize_with = "decimal_from_str")]
    open: Decimal,
    #[serde(deserialize_with = "decimal_from_str")]
    high: Decimal,
    #[serde(deserialize_with = "decimal_from_str")]
    low: Decimal,
    #[serde(deserialize_with = "decimal_from_str")]
    close: Decimal,
    volume: u64,
}

impl From<CandleRow> for Candle {
    fn from(row: CandleRow) -> Self {
        Candle {
            timestamp_ms: row.timestamp_ms,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        }
    }
}

fn decimal_from_str<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: &str = Deserialize::deserialize(deserializer)?;
    s.parse::<Decimal>().map_err(serde::de::Error::custom)
}

fn map_error(err: RestError) -> MarketDataError {
    match err {
        RestError::RateLimited { retry_after_ms } => {
            MarketDataError::SourceRateLimited { retry_after_ms }
        }
        RestError::Unauthorized => MarketDataError::AuthExpired,
        RestError::Timeout => MarketDataError::Timeout,
        RestError::Connection(msg) => MarketDataError::Connection(msg),
        RestError::Parse(msg) => MarketDataError::Source(format!("parse: {}", msg)),
        RestError::Http { status, message } => {
            MarketDataError::Source(format!("HTTP {}: {}", status, message))
        }
        RestError::RequestBuild(msg) => MarketDataError::Source(msg),
    }
}

/// Quote source backed by the broker's REST market-data API.
pub struct RestQuoteSource {
    http: HttpClient,
}

impl RestQuoteSource {
    /// Create a source against the given base URL.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, MarketDataError> {
        let http = HttpClient::with_default_timeout(base_url).map_err(map_error)?;
        Ok(Self { http })
    }
}

#[async_trait]
impl QuoteSource for RestQuoteSource {
    async fn get_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>, MarketDataError> {
        let query = format!("symbols={}", symbols.join(","));
        let response: QuotesResponse = self
            .http
            .get("/md/v1/quotes", Some(&query), None)
            .await
            .map_err(map_error)?;

        Ok(response.quotes.into_iter().map(Quote::from).collect())
    }

    async fn get_history(
        &self,
        symbol: &str,
        resolution: Resolution,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let query = format!(
            "symbol={}&resolution={}&from={}&to={}",
            symbol,
            resolution.as_str(),
            from_ms,
            to_ms
        );
        let response: HistoryResponse = self
            .http
            .get("/md/v1/history", Some(&query), None)
            .await
            .map_err(map_error)?;

        Ok(response.candles.into_iter().map(Candle::from).collect())
    }
}
