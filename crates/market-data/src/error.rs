//! Market-data error types.

use thiserror::Error;

/// Which budget window a request exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    Second,
    Minute,
}

impl std::fmt::Display for RateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Second => write!(f, "per-second"),
            Self::Minute => write!(f, "per-minute"),
        }
    }
}

/// Errors that can occur while acquiring market data.
#[derive(Debug, Error)]
pub enum MarketDataError {
    /// The local request budget was exceeded. Do not retry immediately.
    #[error("rate limit exceeded ({window} window)")]
    RateLimitExceeded {
        /// Window that rejected the request.
        window: RateWindow,
    },

    /// The external source itself signalled rate limiting.
    ///
    /// Distinct from `RateLimitExceeded`: this one trips the scheduler's
    /// aggregate circuit breaker.
    #[error("source rate limited, retry after {retry_after_ms}ms")]
    SourceRateLimited {
        /// Suggested wait before polling resumes.
        retry_after_ms: u64,
    },

    /// Request timed out.
    #[error("request timeout")]
    Timeout,

    /// Connection error (network issue).
    #[error("connection error: {0}")]
    Connection(String),

    /// Credentials rejected by the source.
    #[error("source authentication expired")]
    AuthExpired,

    /// Any other source-side failure.
    #[error("source error: {0}")]
    Source(String),
}

impl MarketDataError {
    /// Check if a single outbound call may be retried with backoff.
    ///
    /// Rate-limit errors are excluded: the local budget must recover on its
    /// own, and a source-side 429 is handled by the circuit breaker.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connection(_))
    }

    /// Check if this error should trip the aggregate circuit breaker.
    pub fn is_source_rate_limited(&self) -> bool {
        matches!(self, Self::SourceRateLimited { .. })
    }
}
