//! Engine configuration.
//!
//! The empirical thresholds (re-price materiality, reversal confirmation
//! cycles) are configuration, not constants baked into the state machine.

use std::time::Duration;

use model::Resolution;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Configuration for the monitoring engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // === Scheduling ===
    /// Cadence of the main scheduler tick.
    pub tick_interval: Duration,
    /// How often per-symbol indicators are recomputed.
    pub indicator_refresh_interval: Duration,

    // === Indicator ===
    /// HMA period over closes.
    pub hma_period: usize,
    /// Resolution used for the indicator history.
    pub history_resolution: Resolution,
    /// Bars of history requested per refresh.
    pub history_lookback_bars: usize,

    // === State machine ===
    /// Minimum HMA move (points) before a resting order is re-priced.
    pub modify_threshold_points: Decimal,
    /// Cycles a reversal must persist before it is confirmed.
    pub reversal_confirm_cycles: u32,

    // === Circuit breaker ===
    /// Pause applied to all polling after the source signals rate limiting.
    pub source_rate_limit_cooldown: Duration,

    // === Bookkeeping ===
    /// Orders older than this are purged from the live-order index.
    pub stale_order_timeout: Duration,
    /// Minute-of-day (engine clock) at which `AtClose` exits fire.
    pub close_minute_of_day: u32,
    /// Static instruments polled every tick in addition to user instruments.
    pub watchlist: Vec<String>,
    /// Prefix for generated order tags.
    pub order_tag_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            indicator_refresh_interval: Duration::from_secs(300),
            hma_period: 21,
            history_resolution: Resolution::FiveMinute,
            history_lookback_bars: 120,
            modify_threshold_points: dec!(0.5),
            reversal_confirm_cycles: 3,
            source_rate_limit_cooldown: Duration::from_secs(30),
            stale_order_timeout: Duration::from_secs(300),
            close_minute_of_day: 15 * 60 + 25,
            watchlist: Vec::new(),
            order_tag_prefix: "hma".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the scheduler tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Builder method to set the indicator refresh interval.
    pub fn with_indicator_refresh_interval(mut self, interval: Duration) -> Self {
        self.indicator_refresh_interval = interval;
        self
    }

    /// Builder method to set the re-price materiality threshold.
    pub fn with_modify_threshold(mut self, points: Decimal) -> Self {
        self.modify_threshold_points = points;
        self
    }

    /// Builder method to set the reversal confirmation cycle count.
    pub fn with_reversal_confirm_cycles(mut self, cycles: u32) -> Self {
        self.reversal_confirm_cycles = cycles;
        self
    }

    /// Builder method to set the static watchlist.
    pub fn with_watchlist(mut self, watchlist: Vec<String>) -> Self {
        self.watchlist = watchlist;
        self
    }

    /// Builder method to set the circuit-breaker cooldown.
    pub fn with_source_rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.source_rate_limit_cooldown = cooldown;
        self
    }
}
