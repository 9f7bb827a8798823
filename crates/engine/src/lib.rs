//! Monitoring engine for HMA-crossover derivative trades.
//!
//! This crate is the runtime triad around the durable state:
//!
//! - **SymbolEngine**: the per-symbol order-lifecycle state machine
//! - **PositionAccountant**: PnL recomputation and prioritized exits
//! - **MonitoringScheduler**: the clock that drives both for every
//!   monitoring-enabled user, in isolation
//!
//! # Architecture
//!
//! ```text
//!                 ┌────────────────────┐  tick (5s)
//!                 │ MonitoringScheduler│◄────────────┐
//!                 └─────────┬──────────┘             │
//!          per user, under  │                        │
//!          that user's lock │                   ┌────┴────┐
//!       ┌───────────────────┼───────────────┐   │ breaker │
//!       ▼                   ▼               ▼   └─────────┘
//! ┌───────────┐      ┌────────────┐  ┌────────────────┐
//! │ indicator │      │SymbolEngine│  │PositionAccount.│
//! │ refresh   │      │ (per sym)  │  │ (per position) │
//! └─────┬─────┘      └─────┬──────┘  └───────┬────────┘
//!       │                  │                 │
//!       ▼                  ▼                 ▼
//! ┌────────────┐     ┌────────────┐   ┌────────────┐
//! │ MarketData │     │OrderGateway│   │ StateStore │
//! └────────────┘     └────────────┘   └────────────┘
//! ```
//!
//! Ordering within a user's pass is fixed: indicator refresh, then the
//! state machine, then position accounting, so a position is never judged
//! against a stale indicator value. Push order events and the explicit
//! recovery sweep converge on the same event-application path.

mod accountant;
mod config;
mod error;
mod orders;
mod paper;
mod scheduler;
mod symbol_engine;

pub use accountant::PositionAccountant;
pub use config::EngineConfig;
pub use error::{EngineError, ErrorKind};
pub use orders::{create_order_index, generate_order_tag, LiveOrderIndex, OrderRef, SharedOrderIndex};
pub use paper::PaperGateway;
pub use scheduler::MonitoringScheduler;
pub use symbol_engine::{reentry_bookkeeping, SymbolEngine};
