//! Position accountant.
//!
//! Runs once per cycle over a user's open positions: refreshes marks,
//! recomputes PnL and holding time, ratchets trailing stops, and fires
//! exits in fixed priority (stop-loss, target, time). Exit orders are
//! market orders; a position carries `pending_exit` until the fill
//! confirms, at which point the closed trade is logged and the symbol's
//! re-entry bookkeeping runs.

use std::collections::HashMap;
use std::sync::Arc;

use broker_core::{GatewayError, OrderGateway, OrderSide, OrderSpec, OrderStatus};
use chrono::Timelike;
use metrics::SharedMetrics;
use model::Quote;
use rust_decimal::Decimal;
use tracing::{info, warn};
use trading_state::{
    ActivePosition, ExitLogEntry, ExitReason, MonitoredSymbol, PendingExit, TimeExit,
    TradingState, TrailingConfig,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::orders::generate_order_tag;
use crate::symbol_engine::reentry_bookkeeping;

/// Recomputes open-position PnL and drives exits.
pub struct PositionAccountant {
    gateway: Arc<dyn OrderGateway>,
    config: Arc<EngineConfig>,
    metrics: SharedMetrics,
}

impl PositionAccountant {
    pub fn new(
        gateway: Arc<dyn OrderGateway>,
        config: Arc<EngineConfig>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            gateway,
            config,
            metrics,
        }
    }

    /// One accountant pass over a user's positions.
    ///
    /// Returns the exit-log entries for every position whose exit fill
    /// confirmed this cycle; the caller appends them to the durable log.
    pub async fn run_pass(
        &self,
        state: &mut TradingState,
        quotes: &HashMap<String, Quote>,
        now_ms: i64,
    ) -> Result<Vec<ExitLogEntry>, EngineError> {
        let user_id = state.user_id.clone();
        let TradingState {
            monitored_symbols,
            active_positions,
            flags,
            ..
        } = state;

        // Refresh marks, ratchet trailing stops, fire exit orders.
        for pos in active_positions.iter_mut() {
            let Some(quote) = quotes.get(&pos.instrument) else {
                continue;
            };
            let Some(sym) = monitored_symbols.iter().find(|s| s.id == pos.symbol_id) else {
                continue;
            };

            pos.update_mark(quote.ltp, now_ms);
            update_trailing(&sym.trailing, pos);

            if pos.pending_exit.is_some() {
                continue;
            }

            let Some(reason) = self.exit_reason(sym, pos, now_ms) else {
                continue;
            };

            let tag = generate_order_tag(&self.config.order_tag_prefix);
            let spec = OrderSpec::market(&pos.instrument, pos.side.closing_side(), pos.quantity, tag);

            match self.gateway.place_order(&spec).await {
                Ok(order_id) => {
                    info!(
                        user = %user_id,
                        instrument = %pos.instrument,
                        order_id = %order_id,
                        reason = %reason,
                        mark = %pos.mark_price,
                        pnl = %pos.pnl_amount,
                        "exit order placed"
                    );
                    pos.pending_exit = Some(PendingExit { order_id, reason });
                }
                Err(GatewayError::Rejected { reason: broker_reason }) => {
                    // Retried next cycle; the trigger condition will still hold.
                    warn!(
                        user = %user_id,
                        instrument = %pos.instrument,
                        reason = %broker_reason,
                        "exit order rejected"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        // Confirm pending exit fills.
        let pending_ids: Vec<String> = active_positions
            .iter()
            .filter_map(|p| p.pending_exit.as_ref().map(|pe| pe.order_id.clone()))
            .collect();
        if pending_ids.is_empty() {
            return Ok(Vec::new());
        }

        let events = self.gateway.recover_order_statuses(&pending_ids).await?;

        let mut completed = Vec::new();
        let mut remove_indices = Vec::new();

        for (idx, pos) in active_positions.iter_mut().enumerate() {
            let Some(pending) = pos.pending_exit.clone() else {
                continue;
            };
            let Some(event) = events.iter().find(|e| e.order_id == pending.order_id) else {
                continue;
            };

            match event.status {
                OrderStatus::Filled => {
                    let exit_price = event.fill_price.unwrap_or(pos.mark_price);
                    pos.update_mark(exit_price, now_ms);

                    completed.push(ExitLogEntry {
                        instrument: pos.instrument.clone(),
                        entry_price: pos.entry_price,
                        entry_time_ms: pos.entry_time_ms,
                        exit_price,
                        exit_time_ms: now_ms,
                        quantity: pos.quantity,
                        holding_days: pos.holding_days,
                        pnl_amount: pos.pnl_amount,
                        pnl_percent: pos.pnl_percent,
                        reason: pending.reason,
                    });
                    remove_indices.push(idx);
                    flags.counters.positions_closed += 1;
                    self.metrics.inc_exits();

                    if let Some(sym) = monitored_symbols
                        .iter_mut()
                        .find(|s| s.id == pos.symbol_id)
                    {
                        let next = reentry_bookkeeping(sym)?;
                        info!(
                            user = %user_id,
                            symbol = %sym.id,
                            reentry_count = sym.reentry_count,
                            next_status = ?next,
                            "position closed"
                        );
                    }
                }
                OrderStatus::Rejected | OrderStatus::Cancelled => {
                    warn!(
                        user = %user_id,
                        instrument = %pos.instrument,
                        order_id = %pending.order_id,
                        status = ?event.status,
                        "exit order terminated without fill; re-arming"
                    );
                    pos.pending_exit = None;
                }
                // Still working; check again next cycle.
                _ => {}
            }
        }

        for idx in remove_indices.into_iter().rev() {
            active_positions.remove(idx);
        }

        Ok(completed)
    }

    /// First exit condition met, in fixed priority.
    fn exit_reason(
        &self,
        sym: &MonitoredSymbol,
        pos: &ActivePosition,
        now_ms: i64,
    ) -> Option<ExitReason> {
        let favour = pos.favourable_points(pos.mark_price);

        // 1. Stop-loss (static, then trailing)
        if sym.stop_loss_points > Decimal::ZERO && favour <= -sym.stop_loss_points {
            return Some(ExitReason::StopLoss);
        }
        if let Some(stop) = pos.trail_stop {
            let hit = match pos.side {
                OrderSide::Buy => pos.mark_price <= stop,
                OrderSide::Sell => pos.mark_price >= stop,
            };
            if hit {
                return Some(ExitReason::TrailingStop);
            }
        }

        // 2. Target
        if sym.target_points > Decimal::ZERO && favour >= sym.target_points {
            return Some(ExitReason::Target);
        }

        // 3. Time-based
        match sym.time_exit {
            TimeExit::Disabled => {}
            TimeExit::AfterMinutes { minutes } => {
                if pos.held_minutes(now_ms) >= minutes as i64 {
                    return Some(ExitReason::TimeExit);
                }
            }
            TimeExit::AtClose => {
                if minute_of_day(now_ms) >= self.config.close_minute_of_day {
                    return Some(ExitReason::TimeExit);
                }
            }
        }

        None
    }
}

/// Ratchet the trailing stop; the level only ever moves in the position's
/// favour.
fn update_trailing(trailing: &TrailingConfig, pos: &mut ActivePosition) {
    let candidate = match trailing {
        TrailingConfig::Disabled => return,
        TrailingConfig::FixedOffset { offset } => trail_candidate(pos, *offset),
        TrailingConfig::ActivateThenTrail { activation, trail } => {
            let activated = pos.trail_stop.is_some()
                || pos.favourable_points(pos.mark_price) >= *activation;
            if !activated {
                return;
            }
            trail_candidate(pos, *trail)
        }
    };

    pos.trail_stop = Some(match (pos.trail_stop, pos.side) {
        (None, _) => candidate,
        (Some(current), OrderSide::Buy) => current.max(candidate),
        (Some(current), OrderSide::Sell) => current.min(candidate),
    });
}

fn trail_candidate(pos: &ActivePosition, offset: Decimal) -> Decimal {
    match pos.side {
        OrderSide::Buy => pos.mark_price - offset,
        OrderSide::Sell => pos.mark_price + offset,
    }
}

fn minute_of_day(now_ms: i64) -> u32 {
    chrono::DateTime::from_timestamp_millis(now_ms)
        .map(|dt| dt.hour() * 60 + dt.minute())
        .unwrap_or(0)
}
