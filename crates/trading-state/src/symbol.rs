//! Monitored symbol: trigger status, sizing, risk config, order linkage.

use broker_core::{OrderSide, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::status::TriggerStatus;

/// Trailing stop-loss behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TrailingConfig {
    #[default]
    Disabled,
    /// Stop follows the mark at a fixed offset, ratcheting only favourably.
    FixedOffset { offset: Decimal },
    /// Trailing activates once the position is `activation` points in profit,
    /// then follows at a `trail` offset.
    ActivateThenTrail { activation: Decimal, trail: Decimal },
}

/// Time-based exit behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimeExit {
    #[default]
    Disabled,
    /// Exit after the position has been held this many minutes.
    AfterMinutes { minutes: u32 },
    /// Exit at the configured end-of-session minute.
    AtClose,
}

/// An in-flight entry/reversal decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSignal {
    /// Consecutive cycles the reversal condition has held.
    pub confirm_cycles: u32,
    pub started_at_ms: i64,
    /// Set when an operator confirmed the reversal manually.
    pub manual_override: bool,
    pub override_reason: Option<String>,
}

impl PendingSignal {
    pub fn new(now_ms: i64) -> Self {
        Self {
            confirm_cycles: 0,
            started_at_ms: now_ms,
            manual_override: false,
            override_reason: None,
        }
    }
}

/// How an order re-price was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationKind {
    CancelReplace,
    Modify,
}

/// Immutable audit record of one order re-price. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderModification {
    pub timestamp_ms: i64,
    pub old_order_id: String,
    pub new_order_id: String,
    pub old_hma: Decimal,
    pub new_hma: Decimal,
    pub old_limit_price: Decimal,
    pub new_limit_price: Decimal,
    pub reason: String,
    pub kind: ModificationKind,
}

/// One symbol under monitoring for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredSymbol {
    // Identity
    pub id: String,
    /// Concrete instrument string.
    pub instrument: String,
    pub side: OrderSide,

    // Sizing
    pub lots: u32,
    /// Contracts (lots * lot size).
    pub quantity: u32,

    // Risk configuration
    pub target_points: Decimal,
    pub stop_loss_points: Decimal,
    pub trailing: TrailingConfig,
    pub time_exit: TimeExit,
    pub max_reentries: u32,
    pub reentry_count: u32,

    // Indicator state
    pub hma_value: Option<Decimal>,
    pub previous_hma_value: Option<Decimal>,
    /// Last traded price seen by the previous pass.
    pub last_price: Option<Decimal>,

    // Order linkage. Invariant: at most one non-terminal order id at a time.
    pub order_id: Option<String>,
    pub order_status: Option<OrderStatus>,
    /// HMA value the live order's limit price was derived from.
    pub placed_hma: Option<Decimal>,
    pub limit_price: Option<Decimal>,
    pub modification_count: u32,
    pub modifications: Vec<OrderModification>,

    pub trigger_status: TriggerStatus,
    pub pending_signal: Option<PendingSignal>,
}

impl MonitoredSymbol {
    pub fn new(
        id: impl Into<String>,
        instrument: impl Into<String>,
        side: OrderSide,
        lots: u32,
        lot_size: u32,
    ) -> Self {
        Self {
            id: id.into(),
            instrument: instrument.into(),
            side,
            lots,
            quantity: lots * lot_size,
            target_points: Decimal::ZERO,
            stop_loss_points: Decimal::ZERO,
            trailing: TrailingConfig::default(),
            time_exit: TimeExit::default(),
            max_reentries: 0,
            reentry_count: 0,
            hma_value: None,
            previous_hma_value: None,
            last_price: None,
            order_id: None,
            order_status: None,
            placed_hma: None,
            limit_price: None,
            modification_count: 0,
            modifications: Vec::new(),
            trigger_status: TriggerStatus::Waiting,
            pending_signal: None,
        }
    }

    /// Whether an order is currently live at the gateway for this symbol.
    pub fn has_live_order(&self) -> bool {
        self.order_id.is_some()
            && self
                .order_status
                .map(|s| s.is_live())
                .unwrap_or(self.trigger_status.order_may_be_live())
    }

    /// Transition to a new trigger status, validated against the table.
    pub fn set_status(&mut self, to: TriggerStatus) -> Result<(), StateError> {
        if !TriggerStatus::can_transition(self.trigger_status, to) {
            return Err(StateError::InvalidTransition {
                from: self.trigger_status,
                to,
            });
        }
        self.trigger_status = to;
        Ok(())
    }

    /// Record a completed order re-price: one audit entry, one count bump.
    pub fn record_modification(&mut self, record: OrderModification) {
        self.modification_count += 1;
        self.modifications.push(record);
    }

    /// Clear the order linkage after the order reached a terminal state.
    pub fn clear_order_linkage(&mut self) {
        self.order_id = None;
        self.order_status = None;
        self.placed_hma = None;
        self.limit_price = None;
    }

    /// Shift the current HMA into `previous_hma_value` and store a new one.
    pub fn update_hma(&mut self, hma: Decimal) {
        self.previous_hma_value = self.hma_value;
        self.hma_value = Some(hma);
    }
}
