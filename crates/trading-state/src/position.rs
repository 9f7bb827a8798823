//! Open position bookkeeping.

use broker_core::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::exit_log::ExitReason;

const MS_PER_DAY: i64 = 86_400_000;

/// An exit order that has been placed but not yet confirmed filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingExit {
    pub order_id: String,
    pub reason: ExitReason,
}

/// An open position created from a fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivePosition {
    /// Id of the monitored symbol this position belongs to.
    pub symbol_id: String,
    pub instrument: String,
    pub side: OrderSide,
    pub entry_price: Decimal,
    pub entry_time_ms: i64,
    /// Contracts.
    pub quantity: u32,

    // Derived each cycle from the latest mark
    pub mark_price: Decimal,
    pub pnl_amount: Decimal,
    pub pnl_percent: Decimal,
    pub holding_days: i64,

    /// Trailing stop level; only ever moves in the position's favour.
    pub trail_stop: Option<Decimal>,
    pub pending_exit: Option<PendingExit>,
}

impl ActivePosition {
    pub fn new(
        symbol_id: impl Into<String>,
        instrument: impl Into<String>,
        side: OrderSide,
        entry_price: Decimal,
        quantity: u32,
        entry_time_ms: i64,
    ) -> Self {
        Self {
            symbol_id: symbol_id.into(),
            instrument: instrument.into(),
            side,
            entry_price,
            entry_time_ms,
            quantity,
            mark_price: entry_price,
            pnl_amount: Decimal::ZERO,
            pnl_percent: Decimal::ZERO,
            holding_days: 0,
            trail_stop: None,
            pending_exit: None,
        }
    }

    /// Points in the position's favour at a given mark.
    pub fn favourable_points(&self, mark: Decimal) -> Decimal {
        match self.side {
            OrderSide::Buy => mark - self.entry_price,
            OrderSide::Sell => self.entry_price - mark,
        }
    }

    /// Refresh the mark and every derived field.
    pub fn update_mark(&mut self, mark: Decimal, now_ms: i64) {
        self.mark_price = mark;

        let points = self.favourable_points(mark);
        self.pnl_amount = points * Decimal::from(self.quantity);
        self.pnl_percent = if self.entry_price > Decimal::ZERO {
            points / self.entry_price * Decimal::from(100)
        } else {
            Decimal::ZERO
        };
        self.holding_days = (now_ms - self.entry_time_ms).max(0) / MS_PER_DAY;
    }

    /// Minutes the position has been held.
    pub fn held_minutes(&self, now_ms: i64) -> i64 {
        (now_ms - self.entry_time_ms).max(0) / 60_000
    }
}
