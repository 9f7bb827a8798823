//! Monitoring scheduler.
//!
//! One repeating tick drives, for every monitoring-enabled user: a gated
//! indicator refresh, one state-machine pass per monitored symbol, and one
//! position-accountant pass. Passes within a user are sequential; passes
//! across users run concurrently under per-user mutual exclusion. A second
//! supervision path manages the order-event pump, open only while at least
//! one user has monitoring enabled or open positions. A source-side rate
//! limit trips a circuit breaker that pauses all polling for a cooldown.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use broker_core::{OrderEvent, OrderGateway};
use chrono::Utc;
use dashmap::DashMap;
use market_data::{MarketData, MarketDataError};
use metrics::SharedMetrics;
use model::Quote;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use trading_state::{StateStore, TradingState};

use crate::accountant::PositionAccountant;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::orders::{create_order_index, SharedOrderIndex};
use crate::symbol_engine::SymbolEngine;

/// HMA steps inspected for the trend-strength log line.
const TREND_LOOKBACK: usize = 10;

struct PumpHandle {
    stop_tx: watch::Sender<bool>,
}

/// The engine's clock: ticks at a fixed cadence and drives every
/// monitoring-enabled user in isolation.
pub struct MonitoringScheduler {
    store: Arc<dyn StateStore>,
    market: Arc<MarketData>,
    gateway: Arc<dyn OrderGateway>,
    symbol_engine: SymbolEngine,
    accountant: PositionAccountant,
    orders: SharedOrderIndex,
    config: Arc<EngineConfig>,
    metrics: SharedMetrics,
    /// Circuit breaker: all polling pauses until this timestamp (0 = open).
    paused_until_ms: AtomicI64,
    user_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    pump: Mutex<Option<PumpHandle>>,
}

impl MonitoringScheduler {
    pub fn new(
        store: Arc<dyn StateStore>,
        market: Arc<MarketData>,
        gateway: Arc<dyn OrderGateway>,
        config: EngineConfig,
        metrics: SharedMetrics,
    ) -> Self {
        let config = Arc::new(config);
        let orders = create_order_index();

        Self {
            symbol_engine: SymbolEngine::new(
                gateway.clone(),
                orders.clone(),
                config.clone(),
                metrics.clone(),
            ),
            accountant: PositionAccountant::new(gateway.clone(), config.clone(), metrics.clone()),
            store,
            market,
            gateway,
            orders,
            config,
            metrics,
            paused_until_ms: AtomicI64::new(0),
            user_locks: DashMap::new(),
            pump: Mutex::new(None),
        }
    }

    /// The symbol engine, for administrative operations.
    pub fn symbol_engine(&self) -> &SymbolEngine {
        &self.symbol_engine
    }

    /// Run the scheduler until shutdown is signalled.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            tick_ms = self.config.tick_interval.as_millis() as u64,
            "monitoring scheduler started"
        );

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("shutdown signal received");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let now_ms = Utc::now().timestamp_millis();
                    self.tick(now_ms).await;
                }
            }
        }

        self.stop_event_pump();
        info!("monitoring scheduler stopped");
    }

    /// One scheduler cycle. Exposed for deterministic clock-stepped tests.
    pub async fn tick(self: &Arc<Self>, now_ms: i64) {
        self.metrics.inc_ticks();

        if self.is_paused(now_ms) {
            debug!("polling paused by circuit breaker");
            return;
        }

        let users = match self.store.monitoring_user_ids().await {
            Ok(users) => users,
            Err(err) => {
                warn!(error = %err, "failed to list monitoring users");
                self.metrics.inc_cycle_errors();
                return;
            }
        };

        // Union of the static watchlist and every user's live instruments,
        // deduplicated and fetched in one batched call.
        let mut symbols: BTreeSet<String> = self.config.watchlist.iter().cloned().collect();
        let mut pump_needed = false;
        for user_id in &users {
            if let Ok(Some(state)) = self.store.load_state(user_id).await {
                if state.flags.is_monitoring || !state.active_positions.is_empty() {
                    pump_needed = true;
                }
                symbols.extend(state.live_instruments());
            }
        }

        if !symbols.is_empty() {
            let batch: Vec<String> = symbols.into_iter().collect();
            match self.market.get_quotes(&batch, now_ms).await {
                Ok(_) => {}
                Err(MarketDataError::SourceRateLimited { retry_after_ms }) => {
                    self.trip_breaker(now_ms, retry_after_ms);
                    return;
                }
                Err(MarketDataError::RateLimitExceeded { .. }) => {
                    debug!("request budget exhausted; passes will use cached quotes");
                }
                Err(err) => {
                    warn!(error = %err, "quote prefetch failed");
                    self.metrics.inc_cycle_errors();
                }
            }
        }

        self.manage_event_pump(pump_needed).await;
        self.market.purge_cache(now_ms);

        for user_id in users {
            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.run_user_pass(&user_id, now_ms).await;
            });
        }
    }

    /// One user's pass under that user's lock.
    ///
    /// A pass already in flight for the user means this tick is skipped for
    /// them; two passes never touch one user's state concurrently.
    pub async fn run_user_pass(&self, user_id: &str, now_ms: i64) {
        let lock = self.user_lock(user_id);
        let Ok(_guard) = lock.try_lock() else {
            debug!(user = %user_id, "previous pass still in flight; skipping tick");
            return;
        };

        if let Err(err) = self.user_pass_inner(user_id, now_ms).await {
            self.metrics.inc_cycle_errors();
            warn!(
                user = %user_id,
                kind = %err.kind(),
                error = %err,
                "user pass failed"
            );
            if let EngineError::SourceRateLimited { retry_after_ms } = err {
                self.trip_breaker(now_ms, retry_after_ms);
            }
        }
    }

    async fn user_pass_inner(&self, user_id: &str, now_ms: i64) -> Result<(), EngineError> {
        let Some(mut state) = self.store.load_state(user_id).await? else {
            return Ok(());
        };
        if !state.flags.is_monitoring || state.flags.requires_reauth {
            return Ok(());
        }

        if let Some(today) = chrono::DateTime::from_timestamp_millis(now_ms) {
            state.rollover_counters(today.date_naive());
        }

        // Indicator refresh, gated by its own longer period.
        let refresh_due = now_ms - state.flags.last_indicator_refresh_ms
            >= self.config.indicator_refresh_interval.as_millis() as i64;
        if refresh_due {
            match self.refresh_indicators(&mut state, now_ms).await {
                Ok(()) => state.flags.last_indicator_refresh_ms = now_ms,
                Err(EngineError::RateLimited) => {
                    debug!(user = %user_id, "indicator refresh deferred by budget");
                }
                Err(EngineError::AuthExpired) => {
                    state.flags.requires_reauth = true;
                    self.store.save_state(user_id, &state).await?;
                    return Err(EngineError::AuthExpired);
                }
                Err(err) => return Err(err),
            }
        }

        // Quotes for this user's instruments; the tick's batched prefetch
        // makes this a cache hit.
        let instruments = state.live_instruments();
        let quote_map: HashMap<String, Quote> = if instruments.is_empty() {
            HashMap::new()
        } else {
            match self.market.get_quotes(&instruments, now_ms).await {
                Ok(quotes) => quotes.into_iter().map(|q| (q.symbol.clone(), q)).collect(),
                Err(MarketDataError::RateLimitExceeded { .. }) => {
                    debug!(user = %user_id, "no quote budget this cycle");
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
        };
        state.flags.last_quote_refresh_ms = now_ms;

        // State-machine pass per symbol, sequential, isolated per symbol.
        let mut reauth = false;
        {
            let user = state.user_id.clone();
            let TradingState {
                monitored_symbols,
                flags,
                ..
            } = &mut state;

            for sym in monitored_symbols.iter_mut() {
                let ltp = quote_map.get(&sym.instrument).map(|q| q.ltp);
                if let Err(err) = self.symbol_engine.repair_status(sym, ltp) {
                    warn!(user = %user, symbol = %sym.id, error = %err, "status repair failed");
                }

                let Some(quote) = quote_map.get(&sym.instrument) else {
                    continue;
                };

                match self
                    .symbol_engine
                    .evaluate(&user, sym, &mut flags.counters, quote, now_ms)
                    .await
                {
                    Ok(()) => {}
                    Err(EngineError::AuthExpired) => {
                        reauth = true;
                        break;
                    }
                    Err(err) => {
                        self.metrics.inc_cycle_errors();
                        warn!(
                            user = %user,
                            symbol = %sym.id,
                            kind = %err.kind(),
                            error = %err,
                            "symbol pass failed"
                        );
                    }
                }
            }
        }

        if reauth {
            state.flags.requires_reauth = true;
            self.store.save_state(user_id, &state).await?;
            return Err(EngineError::AuthExpired);
        }

        // Position accounting runs after the state machine so positions are
        // never judged against a stale indicator value.
        match self.accountant.run_pass(&mut state, &quote_map, now_ms).await {
            Ok(exits) => {
                for entry in &exits {
                    self.store.append_exit_log(user_id, entry).await?;
                }
            }
            Err(EngineError::AuthExpired) => {
                state.flags.requires_reauth = true;
            }
            Err(err) => {
                self.metrics.inc_cycle_errors();
                warn!(
                    user = %user_id,
                    kind = %err.kind(),
                    error = %err,
                    "accountant pass failed"
                );
            }
        }

        // Mid-flight cancellation: the flag may have been cleared while this
        // pass ran; its results are discarded.
        if let Ok(Some(current)) = self.store.load_state(user_id).await {
            if !current.flags.is_monitoring {
                debug!(user = %user_id, "monitoring disabled mid-pass; results discarded");
                return Ok(());
            }
        }

        self.store.save_state(user_id, &state).await?;
        self.metrics.inc_user_passes();
        Ok(())
    }

    async fn refresh_indicators(
        &self,
        state: &mut TradingState,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        let resolution = self.config.history_resolution;
        let from_ms =
            now_ms - self.config.history_lookback_bars as i64 * resolution.duration_ms();

        for sym in state.monitored_symbols.iter_mut() {
            let candles = self
                .market
                .get_history(&sym.instrument, resolution, from_ms, now_ms, now_ms)
                .await?;
            let closes = model::closes(&candles);

            let series = indicator::hma_series(&closes, self.config.hma_period);
            let latest = series.last().copied().flatten();
            let prior = series.len().checked_sub(2).and_then(|i| series[i]);

            if let Some(hma) = latest {
                sym.previous_hma_value = prior.or(sym.hma_value);
                sym.hma_value = Some(hma);

                let signal = indicator::classify_series(&closes, &series)
                    .last()
                    .copied()
                    .unwrap_or(indicator::SignalClass::Neutral);
                let trend = indicator::trend_strength(&series, TREND_LOOKBACK);
                debug!(
                    symbol = %sym.id,
                    hma = %hma,
                    signal = ?signal,
                    trend = ?trend,
                    "indicator refreshed"
                );
            }
        }
        Ok(())
    }

    // ========================================================================
    // Circuit breaker
    // ========================================================================

    fn trip_breaker(&self, now_ms: i64, retry_after_ms: u64) {
        let cooldown = self.config.source_rate_limit_cooldown.as_millis() as i64;
        let until = now_ms + cooldown.max(retry_after_ms as i64);
        self.paused_until_ms.store(until, Ordering::SeqCst);
        self.metrics.inc_breaker_trips();
        warn!(
            resumes_at_ms = until,
            "source rate limited; all polling paused"
        );
    }

    fn is_paused(&self, now_ms: i64) -> bool {
        let until = self.paused_until_ms.load(Ordering::SeqCst);
        if until == 0 {
            return false;
        }
        if now_ms >= until {
            if self
                .paused_until_ms
                .compare_exchange(until, 0, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                info!("circuit breaker lifted; polling resumes");
            }
            return false;
        }
        true
    }

    // ========================================================================
    // Order event pump
    // ========================================================================

    async fn manage_event_pump(self: &Arc<Self>, needed: bool) {
        let running = self.pump.lock().is_some();

        if needed && !running {
            match self.gateway.subscribe_events().await {
                Ok(rx) => {
                    let (stop_tx, stop_rx) = watch::channel(false);
                    *self.pump.lock() = Some(PumpHandle { stop_tx });

                    let scheduler = self.clone();
                    tokio::spawn(async move {
                        scheduler.pump_events(rx, stop_rx).await;
                    });
                    info!("order event pump started");

                    // Anything that happened while the stream was down is
                    // resolved by an explicit sweep, never assumed.
                    self.sweep_all_users().await;
                }
                Err(err) => {
                    warn!(error = %err, "failed to open order event stream");
                    self.metrics.inc_cycle_errors();
                }
            }
        } else if !needed && running {
            self.stop_event_pump();
        }
    }

    fn stop_event_pump(&self) {
        if let Some(handle) = self.pump.lock().take() {
            let _ = handle.stop_tx.send(true);
            info!("order event pump stopped");
        }
    }

    async fn pump_events(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<OrderEvent>,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }

                event = rx.recv() => {
                    match event {
                        Some(event) => self.route_event(event).await,
                        None => {
                            debug!("order event stream closed");
                            self.pump.lock().take();
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn route_event(&self, event: OrderEvent) {
        let Some(owner) = self.orders.lookup(&event.order_id) else {
            debug!(order_id = %event.order_id, "event for untracked order");
            return;
        };

        let lock = self.user_lock(&owner.user_id);
        let _guard = lock.lock().await;
        let now_ms = Utc::now().timestamp_millis();

        if let Err(err) = self
            .apply_event_to_user(&owner.user_id, &owner.symbol_id, &event, now_ms)
            .await
        {
            self.metrics.inc_cycle_errors();
            warn!(
                user = %owner.user_id,
                order_id = %event.order_id,
                kind = %err.kind(),
                error = %err,
                "failed to apply order event"
            );
        }
    }

    async fn apply_event_to_user(
        &self,
        user_id: &str,
        symbol_id: &str,
        event: &OrderEvent,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        let Some(mut state) = self.store.load_state(user_id).await? else {
            return Ok(());
        };

        let changed = {
            let TradingState {
                monitored_symbols,
                active_positions,
                ..
            } = &mut state;

            let Some(sym) = monitored_symbols.iter_mut().find(|s| s.id == symbol_id) else {
                return Ok(());
            };
            self.symbol_engine
                .apply_order_event(sym, active_positions, event, now_ms)?
        };

        if changed {
            self.store.save_state(user_id, &state).await?;
        }
        Ok(())
    }

    // ========================================================================
    // Recovery sweep
    // ========================================================================

    /// Sweep every monitoring user's outstanding order ids.
    ///
    /// Runs after the event pump (re)connects, and on manual trigger.
    pub async fn sweep_all_users(&self) {
        let now_ms = Utc::now().timestamp_millis();
        let users = match self.store.monitoring_user_ids().await {
            Ok(users) => users,
            Err(err) => {
                warn!(error = %err, "sweep could not list users");
                return;
            }
        };

        for user_id in users {
            let lock = self.user_lock(&user_id);
            let _guard = lock.lock().await;

            if let Err(err) = self.sweep_user(&user_id, now_ms).await {
                self.metrics.inc_cycle_errors();
                warn!(user = %user_id, error = %err, "recovery sweep failed");
            }
        }

        self.orders.cleanup_stale(
            self.config.stale_order_timeout.as_millis() as i64,
            now_ms,
        );
    }

    async fn sweep_user(&self, user_id: &str, now_ms: i64) -> Result<u32, EngineError> {
        let Some(mut state) = self.store.load_state(user_id).await? else {
            return Ok(0);
        };

        let applied = self.symbol_engine.recover(user_id, &mut state, now_ms).await?;
        if applied > 0 {
            self.store.save_state(user_id, &state).await?;
        }
        Ok(applied)
    }

    fn user_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.user_locks
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::PaperGateway;
    use async_trait::async_trait;
    use broker_core::OrderSide;
    use chrono::NaiveDate;
    use market_data::QuoteSource;
    use model::{Candle, Resolution};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use trading_state::{MemoryStateStore, MonitoredSymbol, TriggerStatus};

    /// Scriptable quote source: per-symbol last prices plus a constant
    /// close series for history.
    struct ScriptedSource {
        ltps: DashMap<String, Decimal>,
        history_close: Decimal,
        rate_limited: std::sync::atomic::AtomicBool,
        /// When set, the next quote fetch disables monitoring for the user,
        /// emulating an operator acting while a pass is in flight.
        disable_on_fetch: Mutex<Option<(Arc<MemoryStateStore>, String)>>,
    }

    impl ScriptedSource {
        fn new(history_close: Decimal) -> Arc<Self> {
            Arc::new(Self {
                ltps: DashMap::new(),
                history_close,
                rate_limited: std::sync::atomic::AtomicBool::new(false),
                disable_on_fetch: Mutex::new(None),
            })
        }

        fn set_ltp(&self, symbol: &str, ltp: Decimal) {
            self.ltps.insert(symbol.to_string(), ltp);
        }

        fn set_rate_limited(&self, limited: bool) {
            self.rate_limited.store(limited, Ordering::SeqCst);
        }

        fn disable_monitoring_on_next_fetch(&self, store: Arc<MemoryStateStore>, user_id: &str) {
            *self.disable_on_fetch.lock() = Some((store, user_id.to_string()));
        }
    }

    #[async_trait]
    impl QuoteSource for ScriptedSource {
        async fn get_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>, MarketDataError> {
            if self.rate_limited.load(Ordering::SeqCst) {
                return Err(MarketDataError::SourceRateLimited { retry_after_ms: 1_000 });
            }

            let flip = self.disable_on_fetch.lock().take();
            if let Some((store, user_id)) = flip {
                if let Ok(Some(mut state)) = store.load_state(&user_id).await {
                    state.flags.is_monitoring = false;
                    store.save_state(&user_id, &state).await.unwrap();
                }
            }

            Ok(symbols
                .iter()
                .filter_map(|s| {
                    self.ltps.get(s).map(|ltp| Quote {
                        symbol: s.clone(),
                        ltp: *ltp,
                        open: *ltp,
                        high: *ltp,
                        low: *ltp,
                        close: *ltp,
                        volume: 100,
                        change_pct: dec!(0),
                        timestamp_ms: 0,
                    })
                })
                .collect())
        }

        async fn get_history(
            &self,
            _symbol: &str,
            resolution: Resolution,
            from_ms: i64,
            to_ms: i64,
        ) -> Result<Vec<Candle>, MarketDataError> {
            let mut candles = Vec::new();
            let mut ts = from_ms;
            while ts < to_ms {
                candles.push(Candle {
                    timestamp_ms: ts,
                    open: self.history_close,
                    high: self.history_close,
                    low: self.history_close,
                    close: self.history_close,
                    volume: 1,
                });
                ts += resolution.duration_ms();
            }
            Ok(candles)
        }
    }

    const INSTRUMENT: &str = "NIFTY24AUG22500CE";

    struct Harness {
        scheduler: Arc<MonitoringScheduler>,
        store: Arc<MemoryStateStore>,
        source: Arc<ScriptedSource>,
        gateway: Arc<PaperGateway>,
    }

    fn harness(config: EngineConfig) -> Harness {
        let store = Arc::new(MemoryStateStore::new());
        let source = ScriptedSource::new(dec!(100));
        let gateway = Arc::new(PaperGateway::new());
        let metrics = metrics::create_metrics();
        let market = Arc::new(MarketData::with_defaults(source.clone(), metrics.clone()));

        let scheduler = Arc::new(MonitoringScheduler::new(
            store.clone(),
            market,
            gateway.clone(),
            config,
            metrics,
        ));

        Harness {
            scheduler,
            store,
            source,
            gateway,
        }
    }

    async fn seed_user(store: &MemoryStateStore, monitoring: bool) {
        let mut state = TradingState::new("u1", NaiveDate::from_ymd_opt(2024, 8, 5).unwrap());
        state.flags.is_monitoring = monitoring;

        let mut sym = MonitoredSymbol::new("sym-1", INSTRUMENT, OrderSide::Buy, 1, 75);
        sym.update_hma(dec!(100));
        state.monitored_symbols.push(sym);

        store.save_state("u1", &state).await.unwrap();
    }

    fn no_refresh_config() -> EngineConfig {
        EngineConfig::default()
            .with_indicator_refresh_interval(std::time::Duration::from_secs(1_000_000))
    }

    #[tokio::test]
    async fn test_user_pass_classifies_and_saves() {
        let h = harness(no_refresh_config());
        seed_user(&h.store, true).await;
        h.source.set_ltp(INSTRUMENT, dec!(99));

        h.scheduler.run_user_pass("u1", 1_000_000).await;

        let state = h.store.load_state("u1").await.unwrap().unwrap();
        assert_eq!(
            state.monitored_symbols[0].trigger_status,
            TriggerStatus::WaitingForEntry
        );
        assert_eq!(state.flags.last_quote_refresh_ms, 1_000_000);
    }

    #[tokio::test]
    async fn test_non_monitoring_user_is_skipped() {
        let h = harness(no_refresh_config());
        seed_user(&h.store, false).await;
        h.source.set_ltp(INSTRUMENT, dec!(99));

        h.scheduler.run_user_pass("u1", 1_000_000).await;

        let state = h.store.load_state("u1").await.unwrap().unwrap();
        assert_eq!(state.monitored_symbols[0].trigger_status, TriggerStatus::Waiting);
    }

    #[tokio::test]
    async fn test_reauth_user_is_skipped() {
        let h = harness(no_refresh_config());
        seed_user(&h.store, true).await;
        {
            let mut state = h.store.load_state("u1").await.unwrap().unwrap();
            state.flags.requires_reauth = true;
            h.store.save_state("u1", &state).await.unwrap();
        }
        h.source.set_ltp(INSTRUMENT, dec!(99));

        h.scheduler.run_user_pass("u1", 1_000_000).await;

        let state = h.store.load_state("u1").await.unwrap().unwrap();
        assert_eq!(state.monitored_symbols[0].trigger_status, TriggerStatus::Waiting);
    }

    #[tokio::test]
    async fn test_indicator_refresh_computes_hma() {
        // Constant close series: HMA converges to the constant.
        let h = harness(EngineConfig::default());
        seed_user(&h.store, true).await;
        {
            // Wipe the seeded HMA so only the refresh can provide one
            let mut state = h.store.load_state("u1").await.unwrap().unwrap();
            state.monitored_symbols[0].hma_value = None;
            state.monitored_symbols[0].previous_hma_value = None;
            h.store.save_state("u1", &state).await.unwrap();
        }
        h.source.set_ltp(INSTRUMENT, dec!(99));

        h.scheduler.run_user_pass("u1", 1_000_000_000).await;

        let state = h.store.load_state("u1").await.unwrap().unwrap();
        assert_eq!(state.monitored_symbols[0].hma_value, Some(dec!(100)));
        assert_eq!(state.flags.last_indicator_refresh_ms, 1_000_000_000);
    }

    #[tokio::test]
    async fn test_breaker_pauses_and_lifts() {
        let h = harness(no_refresh_config());
        seed_user(&h.store, true).await;
        h.source.set_rate_limited(true);

        h.scheduler.tick(1_000_000).await;
        assert!(h.scheduler.is_paused(1_001_000));

        // Cooldown is 30s: still paused at +29s, lifted at +31s
        assert!(h.scheduler.is_paused(1_000_000 + 29_000));
        assert!(!h.scheduler.is_paused(1_000_000 + 31_000));
    }

    #[tokio::test]
    async fn test_pump_opens_and_closes_with_demand() {
        let h = harness(no_refresh_config());
        seed_user(&h.store, true).await;

        h.scheduler.manage_event_pump(true).await;
        assert!(h.scheduler.pump.lock().is_some());

        h.scheduler.manage_event_pump(false).await;
        assert!(h.scheduler.pump.lock().is_none());
    }

    #[tokio::test]
    async fn test_event_routed_to_owning_user() {
        let h = harness(no_refresh_config());
        seed_user(&h.store, true).await;
        h.source.set_ltp(INSTRUMENT, dec!(99));

        // Classify, then cross above to place an order
        h.scheduler.run_user_pass("u1", 1_000_000).await;
        h.source.set_ltp(INSTRUMENT, dec!(101));
        h.scheduler.run_user_pass("u1", 2_000_000).await;

        let state = h.store.load_state("u1").await.unwrap().unwrap();
        let order_id = state.monitored_symbols[0].order_id.clone().unwrap();
        assert_eq!(
            state.monitored_symbols[0].trigger_status,
            TriggerStatus::OrderPlaced
        );

        // Fill lands; route the resulting event by order id
        h.gateway.fill_order(&order_id, dec!(100)).unwrap();
        let event = OrderEvent {
            order_id,
            status: broker_core::OrderStatus::Filled,
            fill_price: Some(dec!(100)),
            filled_quantity: 75,
            timestamp_ms: 3_000_000,
        };
        h.scheduler.route_event(event).await;

        let state = h.store.load_state("u1").await.unwrap().unwrap();
        assert_eq!(
            state.monitored_symbols[0].trigger_status,
            TriggerStatus::ActivePosition
        );
        assert_eq!(state.active_positions.len(), 1);
    }

    #[tokio::test]
    async fn test_mid_flight_disable_discards_results() {
        // Monitoring is cleared while the pass is already in flight (during
        // its quote fetch). The pass completes its in-flight work but its
        // final reload sees the cleared flag and discards the results.
        let h = harness(no_refresh_config());
        seed_user(&h.store, true).await;
        h.source.set_ltp(INSTRUMENT, dec!(99));
        h.source
            .disable_monitoring_on_next_fetch(h.store.clone(), "u1");

        h.scheduler.run_user_pass("u1", 1_000_000).await;

        let state = h.store.load_state("u1").await.unwrap().unwrap();
        assert!(!state.flags.is_monitoring);
        // The classification the pass computed was not persisted
        assert_eq!(state.monitored_symbols[0].trigger_status, TriggerStatus::Waiting);
        assert_eq!(state.flags.last_quote_refresh_ms, 0);
    }

    #[tokio::test]
    async fn test_run_shuts_down_cleanly() {
        let h = harness(no_refresh_config());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(h.scheduler.clone().run(shutdown_rx));
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
