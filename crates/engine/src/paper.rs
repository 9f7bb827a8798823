//! Paper gateway with simulated fills.
//!
//! Lets the engine run its full order lifecycle without sending anything to
//! a broker. Market orders fill immediately at the configured mark (or the
//! last limit price when no mark is set); limit orders rest until
//! `fill_order` is called, or fill immediately when `auto_fill` is on.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use broker_core::{GatewayError, OrderEvent, OrderGateway, OrderKind, OrderSpec, OrderStatus};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
struct PaperOrder {
    spec: OrderSpec,
    status: OrderStatus,
    fill_price: Option<Decimal>,
    filled_quantity: u32,
}

/// Simulated order gateway.
pub struct PaperGateway {
    auto_fill: bool,
    next_id: AtomicU64,
    orders: DashMap<String, PaperOrder>,
    marks: DashMap<String, Decimal>,
    subscribers: Mutex<Vec<mpsc::Sender<OrderEvent>>>,
    clock_ms: AtomicU64,
}

impl PaperGateway {
    /// Gateway where limit orders rest until filled explicitly.
    pub fn new() -> Self {
        Self {
            auto_fill: false,
            next_id: AtomicU64::new(1),
            orders: DashMap::new(),
            marks: DashMap::new(),
            subscribers: Mutex::new(Vec::new()),
            clock_ms: AtomicU64::new(0),
        }
    }

    /// Gateway where every order fills immediately.
    pub fn auto_filling() -> Self {
        Self {
            auto_fill: true,
            ..Self::new()
        }
    }

    /// Set the mark price used to fill market orders for an instrument.
    pub fn set_mark(&self, instrument: &str, price: Decimal) {
        self.marks.insert(instrument.to_string(), price);
    }

    /// Advance the timestamp stamped on emitted events.
    pub fn set_clock_ms(&self, now_ms: i64) {
        self.clock_ms.store(now_ms as u64, Ordering::Relaxed);
    }

    fn now_ms(&self) -> i64 {
        self.clock_ms.load(Ordering::Relaxed) as i64
    }

    fn next_order_id(&self) -> String {
        format!("paper-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn exec_price(&self, spec: &OrderSpec) -> Decimal {
        match spec.kind {
            OrderKind::Limit => spec.price.unwrap_or(Decimal::ZERO),
            OrderKind::Market => self
                .marks
                .get(&spec.instrument)
                .map(|m| *m)
                .or(spec.price)
                .unwrap_or(Decimal::ZERO),
        }
    }

    fn emit(&self, event: OrderEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.try_send(event.clone()).is_ok());
    }

    fn event_for(&self, order_id: &str, order: &PaperOrder) -> OrderEvent {
        OrderEvent {
            order_id: order_id.to_string(),
            status: order.status,
            fill_price: order.fill_price,
            filled_quantity: order.filled_quantity,
            timestamp_ms: self.now_ms(),
        }
    }

    /// Fill a resting order at the given price (test/driver hook).
    pub fn fill_order(&self, order_id: &str, price: Decimal) -> Result<(), GatewayError> {
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| GatewayError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        if order.status.is_terminal() {
            return Ok(());
        }

        order.status = OrderStatus::Filled;
        order.fill_price = Some(price);
        order.filled_quantity = order.spec.quantity;

        let event = self.event_for(order_id, &order);
        drop(order);
        self.emit(event);
        Ok(())
    }

    /// Reject a resting order (test/driver hook).
    pub fn reject_order(&self, order_id: &str) -> Result<(), GatewayError> {
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| GatewayError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        order.status = OrderStatus::Rejected;
        let event = self.event_for(order_id, &order);
        drop(order);
        self.emit(event);
        Ok(())
    }

    /// Current status of an order, if known.
    pub fn order_status(&self, order_id: &str) -> Option<OrderStatus> {
        self.orders.get(order_id).map(|o| o.status)
    }
}

impl Default for PaperGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn place_order(&self, spec: &OrderSpec) -> Result<String, GatewayError> {
        let order_id = self.next_order_id();
        let fills_now = self.auto_fill || spec.kind == OrderKind::Market;

        let order = if fills_now {
            PaperOrder {
                spec: spec.clone(),
                status: OrderStatus::Filled,
                fill_price: Some(self.exec_price(spec)),
                filled_quantity: spec.quantity,
            }
        } else {
            PaperOrder {
                spec: spec.clone(),
                status: OrderStatus::Open,
                fill_price: None,
                filled_quantity: 0,
            }
        };

        let event = self.event_for(&order_id, &order);
        self.orders.insert(order_id.clone(), order);

        tracing::debug!(
            order_id = %order_id,
            instrument = %spec.instrument,
            side = ?spec.side,
            kind = ?spec.kind,
            quantity = spec.quantity,
            price = ?spec.price,
            "paper order placed"
        );

        self.emit(event);
        Ok(order_id)
    }

    async fn modify_order(
        &self,
        order_id: &str,
        new_price: Decimal,
    ) -> Result<String, GatewayError> {
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| GatewayError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        if order.status.is_terminal() {
            return Err(GatewayError::OrderNotFound {
                order_id: order_id.to_string(),
            });
        }

        order.spec.price = Some(new_price);
        Ok(order_id.to_string())
    }

    async fn cancel_order(&self, order_id: &str) -> Result<bool, GatewayError> {
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| GatewayError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        if order.status.is_terminal() {
            return Ok(false);
        }

        order.status = OrderStatus::Cancelled;
        let event = self.event_for(order_id, &order);
        drop(order);
        self.emit(event);
        Ok(true)
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<OrderEvent>, GatewayError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.subscribers.lock().push(tx);
        Ok(rx)
    }

    async fn recover_order_statuses(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<OrderEvent>, GatewayError> {
        Ok(order_ids
            .iter()
            .filter_map(|id| self.orders.get(id).map(|o| self.event_for(id, &o)))
            .collect())
    }
}
