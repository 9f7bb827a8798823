//! Order status events.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::OrderStatus;

/// A status change for one order.
///
/// Delivered by the gateway's push stream, and also returned by the explicit
/// recovery sweep - both paths converge on this type so the engine applies
/// them identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: String,
    pub status: OrderStatus,
    /// Average fill price, when the event carries a fill.
    pub fill_price: Option<Decimal>,
    /// Contracts filled so far.
    pub filled_quantity: u32,
    pub timestamp_ms: i64,
}

impl OrderEvent {
    /// Check if this event indicates a fill occurred.
    pub fn has_fill(&self) -> bool {
        self.filled_quantity > 0 && self.fill_price.is_some()
    }

    /// Check if this event indicates the order is done.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
