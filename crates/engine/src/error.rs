//! Engine error taxonomy.
//!
//! Every failure surfaces as a structured kind + message pair; raw errors
//! from collaborators are classified at the boundary.

use broker_core::GatewayError;
use market_data::MarketDataError;
use thiserror::Error;
use trading_state::{StateError, StoreError};

/// Coarse classification used for cycle-level handling and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retryable external failure; surfaced after backoff is exhausted.
    Transient,
    /// Expired credential; the user's monitoring pauses until re-auth.
    AuthExpired,
    /// Local request budget exhausted; do not retry immediately.
    RateLimited,
    /// The external source signalled rate limiting; trips the breaker.
    SourceRateLimited,
    /// Broker declined the order; terminal for that attempt.
    Rejected,
    /// A referenced order id is unknown; only a recovery sweep resolves it.
    InconsistentState,
    /// A state-machine or persistence invariant was violated.
    Invariant,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Transient => "transient",
            Self::AuthExpired => "auth_expired",
            Self::RateLimited => "rate_limited",
            Self::SourceRateLimited => "source_rate_limited",
            Self::Rejected => "rejected",
            Self::InconsistentState => "inconsistent_state",
            Self::Invariant => "invariant",
        };
        write!(f, "{}", kind)
    }
}

/// Errors surfaced by engine passes.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("authentication expired; user requires reconnection")]
    AuthExpired,

    #[error("request budget exhausted")]
    RateLimited,

    #[error("source rate limited, cooling down")]
    SourceRateLimited {
        /// Source-suggested pause before polling resumes.
        retry_after_ms: u64,
    },

    #[error("order rejected: {reason}")]
    OrderRejected { reason: String },

    #[error("order {order_id} not known at gateway; recovery sweep required")]
    InconsistentState { order_id: String },

    #[error("symbol {symbol_id} still has a live order")]
    OrderStillLive { symbol_id: String },

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Classify this error for cycle-level handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transient(_) => ErrorKind::Transient,
            Self::AuthExpired => ErrorKind::AuthExpired,
            Self::RateLimited => ErrorKind::RateLimited,
            Self::SourceRateLimited { .. } => ErrorKind::SourceRateLimited,
            Self::OrderRejected { .. } => ErrorKind::Rejected,
            Self::InconsistentState { .. } => ErrorKind::InconsistentState,
            Self::OrderStillLive { .. } | Self::State(_) => ErrorKind::Invariant,
            Self::Store(_) => ErrorKind::Transient,
        }
    }
}

impl From<GatewayError> for EngineError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unauthorized => Self::AuthExpired,
            GatewayError::Unavailable(msg) => Self::Transient(msg),
            GatewayError::Timeout => Self::Transient("gateway timeout".to_string()),
            GatewayError::Rejected { reason } => Self::OrderRejected { reason },
            GatewayError::OrderNotFound { order_id } => Self::InconsistentState { order_id },
        }
    }
}

impl From<MarketDataError> for EngineError {
    fn from(err: MarketDataError) -> Self {
        match err {
            MarketDataError::RateLimitExceeded { .. } => Self::RateLimited,
            MarketDataError::SourceRateLimited { retry_after_ms } => {
                Self::SourceRateLimited { retry_after_ms }
            }
            MarketDataError::AuthExpired => Self::AuthExpired,
            MarketDataError::Timeout => Self::Transient("market data timeout".to_string()),
            MarketDataError::Connection(msg) | MarketDataError::Source(msg) => {
                Self::Transient(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_classification() {
        assert_eq!(
            EngineError::from(GatewayError::Unauthorized).kind(),
            ErrorKind::AuthExpired
        );
        assert_eq!(
            EngineError::from(GatewayError::Timeout).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            EngineError::from(GatewayError::Rejected {
                reason: "margin".into()
            })
            .kind(),
            ErrorKind::Rejected
        );
        assert_eq!(
            EngineError::from(GatewayError::OrderNotFound {
                order_id: "x".into()
            })
            .kind(),
            ErrorKind::InconsistentState
        );
    }

    #[test]
    fn test_market_data_error_classification() {
        assert_eq!(
            EngineError::from(MarketDataError::RateLimitExceeded {
                window: market_data::RateWindow::Second
            })
            .kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(
            EngineError::from(MarketDataError::SourceRateLimited { retry_after_ms: 500 }).kind(),
            ErrorKind::SourceRateLimited
        );
        assert_eq!(
            EngineError::from(MarketDataError::Timeout).kind(),
            ErrorKind::Transient
        );
    }
}
