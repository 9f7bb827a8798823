//! Order types and status enums.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Convert from the broker's string representation.
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }

    /// Convert to the broker's string representation.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }

    /// The side that closes a position opened on this side.
    pub fn closing_side(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// Order kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
}

impl OrderKind {
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s {
            "MARKET" => Some(Self::Market),
            "LIMIT" => Some(Self::Limit),
            _ => None,
        }
    }

    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
        }
    }
}

/// Order status as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Submitted, awaiting acknowledgment.
    PendingAck,
    /// Acknowledged and resting.
    Open,
    /// Partially filled, still live.
    PartiallyFilled,
    /// Completely filled.
    Filled,
    /// Cancelled before completion.
    Cancelled,
    /// Declined by the broker.
    Rejected,
}

impl OrderStatus {
    /// Convert from the broker's string representation.
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::PendingAck),
            "OPEN" => Some(Self::Open),
            "PARTIALLY_FILLED" => Some(Self::PartiallyFilled),
            "FILLED" => Some(Self::Filled),
            "CANCELLED" => Some(Self::Cancelled),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Check if this is a terminal status (order is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }

    /// Check if the order is still live at the gateway.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::PendingAck | Self::Open | Self::PartiallyFilled)
    }
}

/// Specification of a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Concrete instrument string.
    pub instrument: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    /// Contracts (lots * lot size).
    pub quantity: u32,
    /// Limit price (None for market orders).
    pub price: Option<Decimal>,
    /// Caller-assigned tag for correlation.
    pub tag: String,
}

impl OrderSpec {
    /// A limit order.
    pub fn limit(
        instrument: impl Into<String>,
        side: OrderSide,
        quantity: u32,
        price: Decimal,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            side,
            kind: OrderKind::Limit,
            quantity,
            price: Some(price),
            tag: tag.into(),
        }
    }

    /// A market order.
    pub fn market(
        instrument: impl Into<String>,
        side: OrderSide,
        quantity: u32,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            side,
            kind: OrderKind::Market,
            quantity,
            price: None,
            tag: tag.into(),
        }
    }
}
