//! Market-data service: cache, budget and retry around the quote source.

use std::sync::Arc;

use common::{retry, RetryPolicy};
use metrics::SharedMetrics;
use model::{Candle, Quote, Resolution};

use crate::cache::{CacheConfig, QuoteCache, QuoteClass};
use crate::error::MarketDataError;
use crate::governor::{GovernorConfig, RateGovernor};
use crate::source::QuoteSource;

/// Rate-budgeted, cached front to the external quote source.
///
/// A cache hit never touches the governor. A miss consumes one budget slot
/// and wraps the outbound call in bounded backoff (transient failures only).
pub struct MarketData {
    cache: QuoteCache,
    governor: RateGovernor,
    source: Arc<dyn QuoteSource>,
    retry_policy: RetryPolicy,
    metrics: SharedMetrics,
}

impl MarketData {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        cache_config: CacheConfig,
        governor_config: GovernorConfig,
        retry_policy: RetryPolicy,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            cache: QuoteCache::new(cache_config),
            governor: RateGovernor::new(governor_config),
            source,
            retry_policy,
            metrics,
        }
    }

    /// Construct with default cache/governor/retry settings.
    pub fn with_defaults(source: Arc<dyn QuoteSource>, metrics: SharedMetrics) -> Self {
        Self::new(
            source,
            CacheConfig::default(),
            GovernorConfig::default(),
            RetryPolicy::default(),
            metrics,
        )
    }

    /// Fetch live quotes for a batch of instruments.
    pub async fn get_quotes(
        &self,
        symbols: &[String],
        now_ms: i64,
    ) -> Result<Vec<Quote>, MarketDataError> {
        self.get_quotes_with_class(symbols, QuoteClass::Live, now_ms)
            .await
    }

    /// Fetch quotes with an explicit payload class (e.g. index snapshots).
    pub async fn get_quotes_with_class(
        &self,
        symbols: &[String],
        class: QuoteClass,
        now_ms: i64,
    ) -> Result<Vec<Quote>, MarketDataError> {
        let key = QuoteCache::quotes_key(symbols);

        if let Some(quotes) = self.cache.get_quotes(&key, now_ms) {
            self.metrics.inc_cache_hits();
            return Ok(quotes);
        }
        self.metrics.inc_cache_misses();

        if let Err(err) = self.governor.try_acquire(now_ms) {
            self.metrics.inc_governor_rejections();
            return Err(err);
        }

        self.metrics.inc_quote_fetches();
        let quotes = retry(
            &self.retry_policy,
            || self.source.get_quotes(symbols),
            MarketDataError::is_retryable,
        )
        .await?;

        tracing::debug!(
            symbols = symbols.len(),
            returned = quotes.len(),
            "quotes fetched"
        );

        self.cache.put_quotes(key, quotes.clone(), class, now_ms);
        Ok(quotes)
    }

    /// Fetch historical candles for one instrument.
    pub async fn get_history(
        &self,
        symbol: &str,
        resolution: Resolution,
        from_ms: i64,
        to_ms: i64,
        now_ms: i64,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let key = QuoteCache::history_key(symbol, resolution, from_ms, to_ms);

        if let Some(candles) = self.cache.get_candles(&key, now_ms) {
            self.metrics.inc_cache_hits();
            return Ok(candles);
        }
        self.metrics.inc_cache_misses();

        if let Err(err) = self.governor.try_acquire(now_ms) {
            self.metrics.inc_governor_rejections();
            return Err(err);
        }

        self.metrics.inc_quote_fetches();
        let candles = retry(
            &self.retry_policy,
            || self.source.get_history(symbol, resolution, from_ms, to_ms),
            MarketDataError::is_retryable,
        )
        .await?;

        tracing::debug!(
            symbol = %symbol,
            resolution = resolution.as_str(),
            bars = candles.len(),
            "history fetched"
        );

        self.cache
            .put_candles(key, candles.clone(), QuoteClass::History(resolution), now_ms);
        Ok(candles)
    }

    /// Drop expired cache entries.
    pub fn purge_cache(&self, now_ms: i64) {
        self.cache.purge_expired(now_ms);
    }

    /// Requests counted in the current one-second window.
    pub fn requests_this_second(&self, now_ms: i64) -> u32 {
        self.governor.requests_this_second(now_ms)
    }
}
