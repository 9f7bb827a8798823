//! Per-user trading state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::position::ActivePosition;
use crate::symbol::MonitoredSymbol;

/// Per-day activity counters, reset on date rollover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounters {
    pub date: NaiveDate,
    pub orders_placed: u32,
    pub orders_modified: u32,
    pub positions_closed: u32,
}

impl DailyCounters {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            orders_placed: 0,
            orders_modified: 0,
            positions_closed: 0,
        }
    }
}

/// Execution flags and bookkeeping timestamps for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionFlags {
    /// Whether the scheduler drives this user at all.
    pub is_monitoring: bool,
    /// Set when the gateway reported an expired credential; monitoring
    /// pauses until the user reconnects.
    pub requires_reauth: bool,
    pub last_quote_refresh_ms: i64,
    pub last_indicator_refresh_ms: i64,
    pub counters: DailyCounters,
}

impl ExecutionFlags {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            is_monitoring: false,
            requires_reauth: false,
            last_quote_refresh_ms: 0,
            last_indicator_refresh_ms: 0,
            counters: DailyCounters::new(date),
        }
    }
}

/// One user's complete trading state.
///
/// Owned exclusively by that user id; mutated only under it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingState {
    pub user_id: String,
    pub monitored_symbols: Vec<MonitoredSymbol>,
    pub active_positions: Vec<ActivePosition>,
    pub flags: ExecutionFlags,
}

impl TradingState {
    pub fn new(user_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            monitored_symbols: Vec::new(),
            active_positions: Vec::new(),
            flags: ExecutionFlags::new(date),
        }
    }

    pub fn symbol(&self, symbol_id: &str) -> Option<&MonitoredSymbol> {
        self.monitored_symbols.iter().find(|s| s.id == symbol_id)
    }

    pub fn symbol_mut(&mut self, symbol_id: &str) -> Option<&mut MonitoredSymbol> {
        self.monitored_symbols
            .iter_mut()
            .find(|s| s.id == symbol_id)
    }

    pub fn position_for(&self, symbol_id: &str) -> Option<&ActivePosition> {
        self.active_positions
            .iter()
            .find(|p| p.symbol_id == symbol_id)
    }

    /// Every instrument this user needs quotes for: monitored symbols plus
    /// open positions.
    pub fn live_instruments(&self) -> Vec<String> {
        let mut instruments: Vec<String> = self
            .monitored_symbols
            .iter()
            .map(|s| s.instrument.clone())
            .chain(self.active_positions.iter().map(|p| p.instrument.clone()))
            .collect();
        instruments.sort_unstable();
        instruments.dedup();
        instruments
    }

    /// Reset daily counters when the calendar date has moved on.
    pub fn rollover_counters(&mut self, today: NaiveDate) {
        if self.flags.counters.date != today {
            self.flags.counters = DailyCounters::new(today);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_core::OrderSide;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_state() -> TradingState {
        let mut state = TradingState::new("user-1", date(2024, 8, 5));
        state.monitored_symbols.push(MonitoredSymbol::new(
            "sym-1",
            "NIFTY24AUG22500CE",
            OrderSide::Buy,
            1,
            75,
        ));
        state
    }

    #[test]
    fn test_symbol_lookup() {
        let mut state = make_state();
        assert!(state.symbol("sym-1").is_some());
        assert!(state.symbol("missing").is_none());
        assert!(state.symbol_mut("sym-1").is_some());
    }

    #[test]
    fn test_live_instruments_deduplicates() {
        let mut state = make_state();
        state.monitored_symbols.push(MonitoredSymbol::new(
            "sym-2",
            "NIFTY24AUG22500CE",
            OrderSide::Buy,
            1,
            75,
        ));

        assert_eq!(state.live_instruments(), vec!["NIFTY24AUG22500CE"]);
    }

    #[test]
    fn test_rollover_resets_counters() {
        let mut state = make_state();
        state.flags.counters.orders_placed = 7;

        // Same day: untouched
        state.rollover_counters(date(2024, 8, 5));
        assert_eq!(state.flags.counters.orders_placed, 7);

        // Next day: fresh counters
        state.rollover_counters(date(2024, 8, 6));
        assert_eq!(state.flags.counters.orders_placed, 0);
        assert_eq!(state.flags.counters.date, date(2024, 8, 6));
    }

    #[test]
    fn test_serde_roundtrip() {
        let state = make_state();
        let json = serde_json::to_string(&state).unwrap();
        let back: TradingState = serde_json::from_str(&json).unwrap();

        assert_eq!(back.user_id, state.user_id);
        assert_eq!(back.monitored_symbols.len(), 1);
        assert_eq!(back.flags.counters.date, state.flags.counters.date);
    }
}
