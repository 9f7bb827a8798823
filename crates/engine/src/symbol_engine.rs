//! Per-symbol order-lifecycle state machine.
//!
//! One `evaluate` call advances a monitored symbol by one cycle: classify,
//! confirm reversals, place entry orders on confirmed crossovers, and
//! re-price resting orders when the HMA has moved materially. Order-status
//! events (push or recovery sweep) are applied through `apply_order_event`,
//! which is idempotent with respect to replayed events.

use std::sync::Arc;

use broker_core::{GatewayError, OrderEvent, OrderGateway, OrderSpec, OrderStatus};
use metrics::SharedMetrics;
use model::Quote;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use trading_state::{
    DailyCounters, ModificationKind, MonitoredSymbol, OrderModification, PendingSignal,
    StateError, TradingState, TriggerStatus,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::orders::{generate_order_tag, SharedOrderIndex};

/// Re-entry bookkeeping after a position closed.
///
/// Re-arms the symbol for another attempt while the configured budget
/// lasts; otherwise the symbol is cancelled and monitoring stops for it.
pub fn reentry_bookkeeping(sym: &mut MonitoredSymbol) -> Result<TriggerStatus, StateError> {
    if sym.reentry_count < sym.max_reentries {
        sym.reentry_count += 1;
        sym.set_status(TriggerStatus::WaitingReentry)?;
    } else {
        sym.set_status(TriggerStatus::Cancelled)?;
    }
    Ok(sym.trigger_status)
}

/// Drives the trigger-status state machine for monitored symbols.
pub struct SymbolEngine {
    gateway: Arc<dyn OrderGateway>,
    orders: SharedOrderIndex,
    config: Arc<EngineConfig>,
    metrics: SharedMetrics,
}

impl SymbolEngine {
    pub fn new(
        gateway: Arc<dyn OrderGateway>,
        orders: SharedOrderIndex,
        config: Arc<EngineConfig>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            gateway,
            orders,
            config,
            metrics,
        }
    }

    /// Advance one symbol by one scheduled cycle.
    pub async fn evaluate(
        &self,
        user_id: &str,
        sym: &mut MonitoredSymbol,
        counters: &mut DailyCounters,
        quote: &Quote,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        let ltp = quote.ltp;
        let prev_price = sym.last_price;

        let outcome = match sym.trigger_status {
            TriggerStatus::Waiting | TriggerStatus::Unknown => self.classify(sym, ltp),
            TriggerStatus::WaitingReentry => {
                // The cycle restarts at the pullback wait.
                sym.set_status(TriggerStatus::WaitingForReversal)
                    .map_err(Into::into)
            }
            TriggerStatus::WaitingForReversal => self.check_reversal_setup(sym, ltp, now_ms),
            TriggerStatus::ConfirmingReversal => self.confirm_reversal(sym, ltp, now_ms),
            TriggerStatus::WaitingForEntry => {
                self.check_entry(user_id, sym, counters, prev_price, ltp, now_ms)
                    .await
            }
            TriggerStatus::OrderPlaced | TriggerStatus::OrderModified => {
                self.maybe_reprice(user_id, sym, counters, now_ms).await
            }
            // Executed is transient inside event application; position,
            // rejected and cancelled states take no scheduled action.
            TriggerStatus::Executed
            | TriggerStatus::ActivePosition
            | TriggerStatus::OrderRejected
            | TriggerStatus::Cancelled => Ok(()),
        };

        sym.last_price = Some(ltp);
        outcome
    }

    /// Initial classification: entry setup below the HMA, pullback wait above.
    fn classify(&self, sym: &mut MonitoredSymbol, ltp: Decimal) -> Result<(), EngineError> {
        let Some(hma) = sym.hma_value else {
            // No indicator yet; stay put until the first refresh lands.
            return Ok(());
        };

        let to = if ltp <= hma {
            TriggerStatus::WaitingForEntry
        } else {
            TriggerStatus::WaitingForReversal
        };
        sym.set_status(to)?;

        debug!(
            symbol = %sym.id,
            ltp = %ltp,
            hma = %hma,
            status = ?sym.trigger_status,
            "symbol classified"
        );
        Ok(())
    }

    fn check_reversal_setup(
        &self,
        sym: &mut MonitoredSymbol,
        ltp: Decimal,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        let Some(hma) = sym.hma_value else {
            return Ok(());
        };

        if ltp <= hma {
            let mut pending = PendingSignal::new(now_ms);
            pending.confirm_cycles = 1;
            sym.pending_signal = Some(pending);
            sym.set_status(TriggerStatus::ConfirmingReversal)?;
            debug!(symbol = %sym.id, ltp = %ltp, hma = %hma, "reversal setup, confirming");
        }
        Ok(())
    }

    fn confirm_reversal(
        &self,
        sym: &mut MonitoredSymbol,
        ltp: Decimal,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        let Some(hma) = sym.hma_value else {
            return Ok(());
        };

        if ltp > hma {
            // Condition broke before confirmation.
            sym.pending_signal = None;
            sym.set_status(TriggerStatus::WaitingForReversal)?;
            debug!(symbol = %sym.id, "reversal broke during confirmation");
            return Ok(());
        }

        let pending = sym
            .pending_signal
            .get_or_insert_with(|| PendingSignal::new(now_ms));
        pending.confirm_cycles += 1;

        let confirmed =
            pending.manual_override || pending.confirm_cycles >= self.config.reversal_confirm_cycles;

        if confirmed {
            sym.set_status(TriggerStatus::WaitingForEntry)?;
            debug!(symbol = %sym.id, "reversal confirmed");
        }
        Ok(())
    }

    async fn check_entry(
        &self,
        user_id: &str,
        sym: &mut MonitoredSymbol,
        counters: &mut DailyCounters,
        prev_price: Option<Decimal>,
        ltp: Decimal,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        let Some(hma) = sym.hma_value else {
            return Ok(());
        };
        let prev_hma = sym.previous_hma_value.unwrap_or(hma);

        let crossed = match prev_price {
            Some(prev) => prev <= prev_hma && ltp > hma,
            None => false,
        };

        if crossed {
            return self
                .place_entry_order(user_id, sym, counters, hma, now_ms)
                .await;
        }

        // Price sits above the HMA without an observed crossover (e.g. a gap
        // or stale classification): fall back to the pullback wait.
        if ltp > hma {
            sym.set_status(TriggerStatus::WaitingForReversal)?;
        }
        Ok(())
    }

    async fn place_entry_order(
        &self,
        user_id: &str,
        sym: &mut MonitoredSymbol,
        counters: &mut DailyCounters,
        hma: Decimal,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        let limit = hma.round_dp(2);
        let tag = generate_order_tag(&self.config.order_tag_prefix);
        let spec = OrderSpec::limit(&sym.instrument, sym.side, sym.quantity, limit, tag);

        match self.gateway.place_order(&spec).await {
            Ok(order_id) => {
                sym.set_status(TriggerStatus::OrderPlaced)?;
                sym.order_id = Some(order_id.clone());
                sym.order_status = Some(OrderStatus::PendingAck);
                sym.placed_hma = Some(hma);
                sym.limit_price = Some(limit);
                sym.pending_signal = None;
                counters.orders_placed += 1;
                self.orders.register(&order_id, user_id, &sym.id, now_ms);
                self.metrics.inc_orders_placed();

                info!(
                    user = %user_id,
                    symbol = %sym.id,
                    instrument = %sym.instrument,
                    order_id = %order_id,
                    limit = %limit,
                    quantity = sym.quantity,
                    "entry order placed"
                );
                Ok(())
            }
            Err(GatewayError::Rejected { reason }) => {
                sym.set_status(TriggerStatus::OrderPlaced)?;
                sym.set_status(TriggerStatus::OrderRejected)?;
                sym.pending_signal = None;
                self.metrics.inc_orders_rejected();

                warn!(
                    user = %user_id,
                    symbol = %sym.id,
                    reason = %reason,
                    "entry order rejected"
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Re-price a resting order when the HMA has moved materially.
    ///
    /// The previous order id is always superseded before the replacement is
    /// registered, so the at-most-one-live-order invariant holds even when
    /// a prior attempt's outcome is unknown.
    async fn maybe_reprice(
        &self,
        user_id: &str,
        sym: &mut MonitoredSymbol,
        counters: &mut DailyCounters,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        if !sym.has_live_order() {
            return Ok(());
        }
        let (Some(hma), Some(placed_hma)) = (sym.hma_value, sym.placed_hma) else {
            return Ok(());
        };

        let delta = (hma - placed_hma).abs();
        if delta < self.config.modify_threshold_points {
            return Ok(());
        }

        let Some(old_id) = sym.order_id.clone() else {
            return Ok(());
        };
        let old_limit = sym.limit_price.unwrap_or(placed_hma);
        let new_limit = hma.round_dp(2);

        match self.gateway.cancel_order(&old_id).await {
            Ok(_) => {}
            // A prior attempt's outcome may be unknown; superseding an id
            // the gateway no longer knows is safe.
            Err(GatewayError::OrderNotFound { .. }) => {}
            Err(err) => return Err(err.into()),
        }

        let tag = generate_order_tag(&self.config.order_tag_prefix);
        let spec = OrderSpec::limit(&sym.instrument, sym.side, sym.quantity, new_limit, tag);

        let new_id = match self.gateway.place_order(&spec).await {
            Ok(id) => id,
            Err(GatewayError::Rejected { reason }) => {
                self.orders.remove(&old_id);
                sym.clear_order_linkage();
                sym.set_status(TriggerStatus::OrderRejected)?;
                self.metrics.inc_orders_rejected();
                warn!(
                    user = %user_id,
                    symbol = %sym.id,
                    reason = %reason,
                    "replacement order rejected"
                );
                return Ok(());
            }
            // Old linkage is retained: the next cycle supersedes it again.
            Err(err) => return Err(err.into()),
        };

        sym.record_modification(OrderModification {
            timestamp_ms: now_ms,
            old_order_id: old_id.clone(),
            new_order_id: new_id.clone(),
            old_hma: placed_hma,
            new_hma: hma,
            old_limit_price: old_limit,
            new_limit_price: new_limit,
            reason: format!("hma moved {} points", delta.round_dp(2)),
            kind: ModificationKind::CancelReplace,
        });
        sym.order_id = Some(new_id.clone());
        sym.order_status = Some(OrderStatus::PendingAck);
        sym.placed_hma = Some(hma);
        sym.limit_price = Some(new_limit);
        sym.set_status(TriggerStatus::OrderModified)?;
        counters.orders_modified += 1;
        self.orders.remove(&old_id);
        self.orders.register(&new_id, user_id, &sym.id, now_ms);
        self.metrics.inc_orders_modified();

        info!(
            user = %user_id,
            symbol = %sym.id,
            old_order_id = %old_id,
            new_order_id = %new_id,
            old_limit = %old_limit,
            new_limit = %new_limit,
            modification_count = sym.modification_count,
            "order re-priced"
        );
        Ok(())
    }

    /// Apply one order-status event to a symbol.
    ///
    /// Events for an id that is not the symbol's current live order are
    /// no-ops, which makes replayed and superseded events safe. Returns
    /// whether state changed.
    pub fn apply_order_event(
        &self,
        sym: &mut MonitoredSymbol,
        positions: &mut Vec<trading_state::ActivePosition>,
        event: &OrderEvent,
        now_ms: i64,
    ) -> Result<bool, EngineError> {
        if sym.order_id.as_deref() != Some(event.order_id.as_str()) {
            return Ok(false);
        }

        match event.status {
            OrderStatus::Filled => {
                let fill_price = event
                    .fill_price
                    .or(sym.limit_price)
                    .unwrap_or(Decimal::ZERO);

                sym.set_status(TriggerStatus::Executed)?;
                positions.push(trading_state::ActivePosition::new(
                    sym.id.clone(),
                    sym.instrument.clone(),
                    sym.side,
                    fill_price,
                    sym.quantity,
                    now_ms,
                ));
                self.orders.remove(&event.order_id);
                sym.clear_order_linkage();
                sym.set_status(TriggerStatus::ActivePosition)?;
                self.metrics.inc_fills();

                info!(
                    symbol = %sym.id,
                    order_id = %event.order_id,
                    fill_price = %fill_price,
                    "entry filled, position opened"
                );
                Ok(true)
            }
            OrderStatus::Rejected | OrderStatus::Cancelled => {
                sym.set_status(TriggerStatus::OrderRejected)?;
                self.orders.remove(&event.order_id);
                sym.clear_order_linkage();
                self.metrics.inc_orders_rejected();

                warn!(
                    symbol = %sym.id,
                    order_id = %event.order_id,
                    status = ?event.status,
                    "entry order terminated without fill"
                );
                Ok(true)
            }
            OrderStatus::PendingAck | OrderStatus::Open | OrderStatus::PartiallyFilled => {
                let changed = sym.order_status != Some(event.status);
                sym.order_status = Some(event.status);
                Ok(changed)
            }
        }
    }

    /// Recovery sweep over a user's outstanding order ids.
    ///
    /// Queries current statuses at the gateway and applies them through the
    /// same path as push events. This is the only mechanism that resolves
    /// an inconsistent order id; nothing is assumed.
    pub async fn recover(
        &self,
        user_id: &str,
        state: &mut TradingState,
        now_ms: i64,
    ) -> Result<u32, EngineError> {
        let ids: Vec<String> = state
            .monitored_symbols
            .iter()
            .filter(|s| s.has_live_order())
            .filter_map(|s| s.order_id.clone())
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let events = self.gateway.recover_order_statuses(&ids).await?;

        let TradingState {
            monitored_symbols,
            active_positions,
            ..
        } = state;

        let mut applied = 0;
        for event in &events {
            if let Some(sym) = monitored_symbols
                .iter_mut()
                .find(|s| s.order_id.as_deref() == Some(event.order_id.as_str()))
            {
                if self.apply_order_event(sym, active_positions, event, now_ms)? {
                    applied += 1;
                }
            }
        }

        for id in &ids {
            if !events.iter().any(|e| &e.order_id == id) {
                warn!(
                    user = %user_id,
                    order_id = %id,
                    "order id unknown at gateway; left untouched for the next sweep"
                );
            }
        }

        info!(user = %user_id, swept = ids.len(), applied, "recovery sweep complete");
        Ok(applied)
    }

    // ========================================================================
    // Administrative operations
    // ========================================================================

    /// Clear a pending decision back to the initial state.
    ///
    /// Refused while an order is live: the linkage must be resolved first.
    pub fn reset(&self, sym: &mut MonitoredSymbol) -> Result<(), EngineError> {
        if sym.has_live_order() {
            return Err(EngineError::OrderStillLive {
                symbol_id: sym.id.clone(),
            });
        }
        sym.pending_signal = None;
        sym.set_status(TriggerStatus::Waiting)?;
        Ok(())
    }

    /// Reclassify a symbol whose persisted status was out-of-enum.
    ///
    /// Applies the same price-vs-HMA rule as initial classification; without
    /// enough data the symbol falls back to `Waiting`. Returns whether a
    /// repair happened.
    pub fn repair_status(
        &self,
        sym: &mut MonitoredSymbol,
        ltp: Option<Decimal>,
    ) -> Result<bool, EngineError> {
        if sym.trigger_status != TriggerStatus::Unknown {
            return Ok(false);
        }

        match (ltp, sym.hma_value) {
            (Some(ltp), Some(_)) => self.classify(sym, ltp)?,
            _ => sym.set_status(TriggerStatus::Waiting)?,
        }

        info!(symbol = %sym.id, status = ?sym.trigger_status, "status repaired");
        Ok(true)
    }

    /// Re-arm a symbol after a broker rejection (operator action).
    pub fn retrigger_rejected(&self, sym: &mut MonitoredSymbol) -> Result<(), EngineError> {
        if sym.trigger_status != TriggerStatus::OrderRejected {
            return Err(StateError::InvalidTransition {
                from: sym.trigger_status,
                to: TriggerStatus::Waiting,
            }
            .into());
        }
        sym.clear_order_linkage();
        sym.pending_signal = None;
        sym.set_status(TriggerStatus::Waiting)?;
        Ok(())
    }

    /// Manually confirm a reversal, bypassing the cycle count.
    pub fn confirm_reversal_manually(
        &self,
        sym: &mut MonitoredSymbol,
        reason: &str,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        if sym.trigger_status != TriggerStatus::ConfirmingReversal {
            return Err(StateError::InvalidTransition {
                from: sym.trigger_status,
                to: TriggerStatus::WaitingForEntry,
            }
            .into());
        }

        let pending = sym
            .pending_signal
            .get_or_insert_with(|| PendingSignal::new(now_ms));
        pending.manual_override = true;
        pending.override_reason = Some(reason.to_string());

        sym.set_status(TriggerStatus::WaitingForEntry)?;
        info!(symbol = %sym.id, reason = %reason, "reversal confirmed manually");
        Ok(())
    }
}
