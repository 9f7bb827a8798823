//! Keyed quote/candle cache with class-specific TTLs.

use std::collections::HashMap;

use model::{Candle, Quote, Resolution};
use parking_lot::Mutex;

/// Payload class, which determines the TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteClass {
    /// Live instrument quotes.
    Live,
    /// Index spot snapshots (slightly slower-moving).
    IndexSnapshot,
    /// Historical candles; intraday bars go stale faster than daily ones.
    History(Resolution),
}

/// TTLs per payload class, in milliseconds.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub live_ttl_ms: i64,
    pub index_ttl_ms: i64,
    pub intraday_history_ttl_ms: i64,
    pub daily_history_ttl_ms: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            live_ttl_ms: 5_000,
            index_ttl_ms: 10_000,
            intraday_history_ttl_ms: 4 * 3_600_000,
            daily_history_ttl_ms: 24 * 3_600_000,
        }
    }
}

impl CacheConfig {
    fn ttl_ms(&self, class: QuoteClass) -> i64 {
        match class {
            QuoteClass::Live => self.live_ttl_ms,
            QuoteClass::IndexSnapshot => self.index_ttl_ms,
            QuoteClass::History(resolution) if resolution.is_intraday() => {
                self.intraday_history_ttl_ms
            }
            QuoteClass::History(_) => self.daily_history_ttl_ms,
        }
    }
}

#[derive(Debug, Clone)]
enum Payload {
    Quotes(Vec<Quote>),
    Candles(Vec<Candle>),
}

#[derive(Debug)]
struct Entry {
    payload: Payload,
    fetched_at_ms: i64,
    ttl_ms: i64,
}

impl Entry {
    fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms - self.fetched_at_ms < self.ttl_ms
    }
}

/// In-memory TTL cache in front of the quote source.
#[derive(Debug)]
pub struct QuoteCache {
    config: CacheConfig,
    entries: Mutex<HashMap<String, Entry>>,
}

impl QuoteCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache key for a symbol batch: sorted, deduplicated, joined.
    ///
    /// Two requests for the same set of symbols in any order share a key.
    pub fn quotes_key(symbols: &[String]) -> String {
        let mut sorted: Vec<&str> = symbols.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();
        sorted.join(",")
    }

    /// Cache key for a history request.
    pub fn history_key(symbol: &str, resolution: Resolution, from_ms: i64, to_ms: i64) -> String {
        format!("hist:{}:{}:{}:{}", symbol, resolution.as_str(), from_ms, to_ms)
    }

    pub fn get_quotes(&self, key: &str, now_ms: i64) -> Option<Vec<Quote>> {
        let entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(now_ms) => match &entry.payload {
                Payload::Quotes(quotes) => Some(quotes.clone()),
                Payload::Candles(_) => None,
            },
            _ => None,
        }
    }

    pub fn put_quotes(&self, key: String, quotes: Vec<Quote>, class: QuoteClass, now_ms: i64) {
        self.entries.lock().insert(
            key,
            Entry {
                payload: Payload::Quotes(quotes),
                fetched_at_ms: now_ms,
                ttl_ms: self.config.ttl_ms(class),
            },
        );
    }

    pub fn get_candles(&self, key: &str, now_ms: i64) -> Option<Vec<Candle>> {
        let entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(now_ms) => match &entry.payload {
                Payload::Candles(candles) => Some(candles.clone()),
                Payload::Quotes(_) => None,
            },
            _ => None,
        }
    }

    pub fn put_candles(&self, key: String, candles: Vec<Candle>, class: QuoteClass, now_ms: i64) {
        self.entries.lock().insert(
            key,
            Entry {
                payload: Payload::Candles(candles),
                fetched_at_ms: now_ms,
                ttl_ms: self.config.ttl_ms(class),
            },
        );
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self, now_ms: i64) {
        self.entries.lock().retain(|_, entry| entry.is_fresh(now_ms));
    }

    /// Number of cached entries (fresh or not).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_quote(symbol: &str) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            ltp: dec!(100),
            open: dec!(99),
            high: dec!(101),
            low: dec!(98),
            close: dec!(100),
            volume: 1000,
            change_pct: dec!(0),
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_quotes_key_is_order_independent() {
        let a = QuoteCache::quotes_key(&["B".into(), "A".into(), "C".into()]);
        let b = QuoteCache::quotes_key(&["C".into(), "A".into(), "B".into()]);
        assert_eq!(a, b);
        assert_eq!(a, "A,B,C");
    }

    #[test]
    fn test_quotes_key_deduplicates() {
        let key = QuoteCache::quotes_key(&["A".into(), "A".into(), "B".into()]);
        assert_eq!(key, "A,B");
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = QuoteCache::default();
        let key = QuoteCache::quotes_key(&["A".into()]);

        cache.put_quotes(key.clone(), vec![make_quote("A")], QuoteClass::Live, 1_000);

        // 4s later: within the 5s live TTL
        let hit = cache.get_quotes(&key, 5_000);
        assert!(hit.is_some());
        assert_eq!(hit.unwrap()[0].symbol, "A");
    }

    #[test]
    fn test_miss_after_ttl() {
        let cache = QuoteCache::default();
        let key = QuoteCache::quotes_key(&["A".into()]);

        cache.put_quotes(key.clone(), vec![make_quote("A")], QuoteClass::Live, 1_000);

        assert!(cache.get_quotes(&key, 6_001).is_none());
    }

    #[test]
    fn test_index_class_has_longer_ttl() {
        let cache = QuoteCache::default();
        let key = "NIFTY50".to_string();

        cache.put_quotes(
            key.clone(),
            vec![make_quote("NIFTY50")],
            QuoteClass::IndexSnapshot,
            1_000,
        );

        // 8s later: past the live TTL but within the 10s index TTL
        assert!(cache.get_quotes(&key, 9_000).is_some());
        assert!(cache.get_quotes(&key, 12_000).is_none());
    }

    #[test]
    fn test_history_ttl_by_resolution() {
        let cache = QuoteCache::default();
        let candle = Candle {
            timestamp_ms: 0,
            open: dec!(1),
            high: dec!(1),
            low: dec!(1),
            close: dec!(1),
            volume: 1,
        };

        let intraday = QuoteCache::history_key("A", Resolution::FiveMinute, 0, 1);
        let daily = QuoteCache::history_key("A", Resolution::Daily, 0, 1);

        cache.put_candles(
            intraday.clone(),
            vec![candle.clone()],
            QuoteClass::History(Resolution::FiveMinute),
            0,
        );
        cache.put_candles(
            daily.clone(),
            vec![candle],
            QuoteClass::History(Resolution::Daily),
            0,
        );

        let six_hours = 6 * 3_600_000;
        assert!(cache.get_candles(&intraday, six_hours).is_none());
        assert!(cache.get_candles(&daily, six_hours).is_some());
    }

    #[test]
    fn test_purge_expired() {
        let cache = QuoteCache::default();

        cache.put_quotes("a".into(), vec![make_quote("A")], QuoteClass::Live, 0);
        cache.put_quotes("b".into(), vec![make_quote("B")], QuoteClass::Live, 100_000);
        assert_eq!(cache.len(), 2);

        cache.purge_expired(101_000);
        assert_eq!(cache.len(), 1);
    }
}
