//! Durable per-user trading state.
//!
//! Everything the engine persists lives here:
//!
//! - **TradingState**: one user's monitored symbols, open positions and
//!   execution flags; owned exclusively by that user id
//! - **MonitoredSymbol**: per-symbol trigger status, indicator state, order
//!   linkage and modification history
//! - **TriggerStatus**: closed status enum with an explicit transition table,
//!   validated on every write; out-of-enum values deserialize to `Unknown`
//!   and are repaired at the boundary
//! - **ActivePosition** / **ExitLogEntry**: open-position bookkeeping and the
//!   append-only closed-trade log
//! - **StateStore**: the persistence seam, plus an in-memory implementation
//!
//! All persisted layouts round-trip through serde exactly.

mod error;
mod exit_log;
mod position;
mod state;
mod status;
mod store;
mod symbol;

pub use error::{StateError, StoreError};
pub use exit_log::{ExitLogEntry, ExitReason};
pub use position::{ActivePosition, PendingExit};
pub use state::{DailyCounters, ExecutionFlags, TradingState};
pub use status::TriggerStatus;
pub use store::{MemoryStateStore, StateStore};
pub use symbol::{
    ModificationKind, MonitoredSymbol, OrderModification, PendingSignal, TimeExit, TrailingConfig,
};
