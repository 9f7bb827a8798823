//! Order gateway seam.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::event::OrderEvent;
use crate::order::OrderSpec;

/// Errors that can occur when talking to the order gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Credential expired; the user must reconnect before trading resumes.
    #[error("unauthorized: requires reauthentication")]
    Unauthorized,

    /// Transient gateway failure.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// Request timed out.
    #[error("gateway timeout")]
    Timeout,

    /// Broker declined the order; terminal for that order.
    #[error("order rejected: {reason}")]
    Rejected {
        /// Broker's rejection reason.
        reason: String,
    },

    /// A referenced order id is not known at the gateway.
    #[error("order not found: {order_id}")]
    OrderNotFound {
        /// The unknown order id.
        order_id: String,
    },
}

impl GatewayError {
    /// Check if this error may be retried with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}

/// Order gateway: place, modify, cancel, observe.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Place a new order; returns the gateway-assigned order id.
    async fn place_order(&self, spec: &OrderSpec) -> Result<String, GatewayError>;

    /// Re-price a resting order; returns the (possibly new) order id.
    async fn modify_order(&self, order_id: &str, new_price: Decimal)
        -> Result<String, GatewayError>;

    /// Cancel a resting order. Returns false when it was already done.
    async fn cancel_order(&self, order_id: &str) -> Result<bool, GatewayError>;

    /// Subscribe to push order-status events.
    ///
    /// The gateway delivers every status change on the returned channel
    /// until the receiver is dropped.
    async fn subscribe_events(&self) -> Result<mpsc::Receiver<OrderEvent>, GatewayError>;

    /// Query current statuses for a set of order ids.
    ///
    /// Used by the recovery sweep after a reconnect or on manual trigger;
    /// ids unknown to the gateway are simply absent from the result.
    async fn recover_order_statuses(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<OrderEvent>, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GatewayError::Unavailable("503".into()).is_retryable());
        assert!(GatewayError::Timeout.is_retryable());

        assert!(!GatewayError::Unauthorized.is_retryable());
        assert!(!GatewayError::Rejected {
            reason: "margin".into()
        }
        .is_retryable());
        assert!(!GatewayError::OrderNotFound {
            order_id: "x".into()
        }
        .is_retryable());
    }
}
