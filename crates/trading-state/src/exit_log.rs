//! Append-only closed-trade log.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    Target,
    TimeExit,
    Manual,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopLoss => write!(f, "stop_loss"),
            Self::TrailingStop => write!(f, "trailing_stop"),
            Self::Target => write!(f, "target"),
            Self::TimeExit => write!(f, "time_exit"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Immutable record of one closed trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitLogEntry {
    pub instrument: String,
    pub entry_price: Decimal,
    pub entry_time_ms: i64,
    pub exit_price: Decimal,
    pub exit_time_ms: i64,
    pub quantity: u32,
    pub holding_days: i64,
    pub pnl_amount: Decimal,
    pub pnl_percent: Decimal,
    pub reason: ExitReason,
}
