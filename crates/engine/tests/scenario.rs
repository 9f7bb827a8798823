//! End-to-end walkthrough of the entry/modify/fill/exit/re-entry cycle,
//! driven through the scheduler with the paper gateway and in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use broker_core::OrderSide;
use chrono::NaiveDate;
use dashmap::DashMap;
use engine::{EngineConfig, MonitoringScheduler, PaperGateway};
use market_data::{MarketData, MarketDataError, QuoteSource};
use model::{Candle, Quote, Resolution};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trading_state::{
    MemoryStateStore, MonitoredSymbol, StateStore, TradingState, TriggerStatus,
};

const INSTRUMENT: &str = "NIFTY24AUG22500CE";
const USER: &str = "u1";

struct ScriptedSource {
    ltps: DashMap<String, Decimal>,
}

#[async_trait]
impl QuoteSource for ScriptedSource {
    async fn get_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>, MarketDataError> {
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
        _resolution: Resolution,
        _from_ms: i64,
        _to_ms: i64,
    ) -> Result<Vec<Candle>, MarketDataError> {
        Ok(Vec::new())
    }
}

struct Fixture {
    scheduler: Arc<MonitoringScheduler>,
    store: Arc<MemoryStateStore>,
    gateway: Arc<PaperGateway>,
    source: Arc<ScriptedSource>,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(MemoryStateStore::new());
        let gateway = Arc::new(PaperGateway::new());
        let source = Arc::new(ScriptedSource {
            ltps: DashMap::new(),
        });
        let metrics = metrics::create_metrics();
        let market = Arc::new(MarketData::with_defaults(source.clone(), metrics.clone()));

        // Indicator refresh disabled: the test scripts HMA values directly.
        let config = EngineConfig::default()
            .with_indicator_refresh_interval(Duration::from_secs(1_000_000))
            .with_reversal_confirm_cycles(1);

        let scheduler = Arc::new(MonitoringScheduler::new(
            store.clone(),
            market,
            gateway.clone(),
            config,
            metrics,
        ));

        Self {
            scheduler,
            store,
            gateway,
            source,
        }
    }

    async fn seed(&self) {
        let mut state = TradingState::new(USER, NaiveDate::from_ymd_opt(2024, 8, 5).unwrap());
        state.flags.is_monitoring = true;

        let mut sym = MonitoredSymbol::new("sym-1", INSTRUMENT, OrderSide::Buy, 1, 75);
        sym.target_points = dec!(20);
        sym.stop_loss_points = dec!(10);
        sym.max_reentries = 1;
        sym.update_hma(dec!(100));
        state.monitored_symbols.push(sym);

        self.store.save_state(USER, &state).await.unwrap();
    }

    async fn state(&self) -> TradingState {
        self.store.load_state(USER).await.unwrap().unwrap()
    }

    async fn set_hma(&self, hma: Decimal) {
        let mut state = self.state().await;
        state.monitored_symbols[0].update_hma(hma);
        self.store.save_state(USER, &state).await.unwrap();
    }

    async fn pass(&self, ltp: Decimal, now_ms: i64) {
        self.source.ltps.insert(INSTRUMENT.to_string(), ltp);
        self.scheduler.run_user_pass(USER, now_ms).await;
    }
}

#[tokio::test]
async fn full_trade_cycle_with_reentry_budget() {
    let f = Fixture::new();
    f.seed().await;
    let mut now = 1_000_000_000;
    let step = 5_000;

    // Classification: below the HMA means entry setup
    f.pass(dec!(99), now).await;
    assert_eq!(
        f.state().await.monitored_symbols[0].trigger_status,
        TriggerStatus::WaitingForEntry
    );

    // (a) price crosses above HMA=100 at 101: order placed with limit=100
    now += step;
    f.pass(dec!(101), now).await;
    let state = f.state().await;
    let sym = &state.monitored_symbols[0];
    assert_eq!(sym.trigger_status, TriggerStatus::OrderPlaced);
    assert_eq!(sym.limit_price, Some(dec!(100)));
    let first_order = sym.order_id.clone().unwrap();

    // (b) HMA moves to 100.75 (0.75 >= 0.5): cancel/replace, count=1
    f.set_hma(dec!(100.75)).await;
    now += step;
    f.pass(dec!(101.5), now).await;
    let state = f.state().await;
    let sym = &state.monitored_symbols[0];
    assert_eq!(sym.trigger_status, TriggerStatus::OrderModified);
    assert_eq!(sym.modification_count, 1);
    assert_eq!(sym.limit_price, Some(dec!(100.75)));
    let second_order = sym.order_id.clone().unwrap();
    assert_ne!(second_order, first_order);

    // (c) fill for the live order arrives: position at the fill price
    f.gateway.fill_order(&second_order, dec!(100.75)).unwrap();
    f.scheduler.sweep_all_users().await;
    let state = f.state().await;
    assert_eq!(
        state.monitored_symbols[0].trigger_status,
        TriggerStatus::ActivePosition
    );
    assert_eq!(state.active_positions.len(), 1);
    assert_eq!(state.active_positions[0].entry_price, dec!(100.75));

    // (d) price reaches entry + target: exit, positive pnl logged,
    //     position removed
    f.gateway.set_mark(INSTRUMENT, dec!(120.75));
    now += step;
    f.pass(dec!(120.75), now).await;
    let state = f.state().await;
    assert!(state.active_positions.is_empty());

    let log = f.store.exit_log(USER);
    assert_eq!(log.len(), 1);
    assert!(log[0].pnl_amount > Decimal::ZERO);
    assert_eq!(log[0].pnl_amount, dec!(1500)); // 20 points * 75

    // (e) max_reentries=1: first exit re-arms the symbol
    let sym = &state.monitored_symbols[0];
    assert_eq!(sym.trigger_status, TriggerStatus::WaitingReentry);
    assert_eq!(sym.reentry_count, 1);

    // Second attempt: re-entry restarts at the pullback wait
    now += step;
    f.pass(dec!(105), now).await;
    assert_eq!(
        f.state().await.monitored_symbols[0].trigger_status,
        TriggerStatus::WaitingForReversal
    );

    // Pullback below the HMA, then confirmation (1 cycle configured)
    now += step;
    f.pass(dec!(99), now).await;
    assert_eq!(
        f.state().await.monitored_symbols[0].trigger_status,
        TriggerStatus::ConfirmingReversal
    );
    now += step;
    f.pass(dec!(99.5), now).await;
    assert_eq!(
        f.state().await.monitored_symbols[0].trigger_status,
        TriggerStatus::WaitingForEntry
    );

    // Second crossover and fill
    now += step;
    f.pass(dec!(101.5), now).await;
    let third_order = f.state().await.monitored_symbols[0]
        .order_id
        .clone()
        .unwrap();
    f.gateway.fill_order(&third_order, dec!(100.75)).unwrap();
    f.scheduler.sweep_all_users().await;
    assert_eq!(f.state().await.active_positions.len(), 1);

    // Second exit exhausts the re-entry budget: symbol cancelled
    f.gateway.set_mark(INSTRUMENT, dec!(121));
    now += step;
    f.pass(dec!(121), now).await;
    let state = f.state().await;
    assert!(state.active_positions.is_empty());
    assert_eq!(
        state.monitored_symbols[0].trigger_status,
        TriggerStatus::Cancelled
    );
    assert_eq!(state.monitored_symbols[0].reentry_count, 1);
    assert_eq!(f.store.exit_log(USER).len(), 2);
}
