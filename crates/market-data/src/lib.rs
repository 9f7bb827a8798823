//! Rate-budgeted, cached market-data acquisition.
//!
//! This crate sits between the engine and the external quote source:
//!
//! - **QuoteCache**: short-TTL cache keyed by the sorted symbol set, with
//!   class-specific TTLs (live quotes, index snapshots, historical candles)
//! - **RateGovernor**: rolling 1s/60s request budget; exceeding either window
//!   fails synchronously with `RateLimitExceeded` - callers must not retry
//! - **QuoteSource**: the seam to the external API
//! - **MarketData**: combines the three, wrapping outbound calls in bounded
//!   exponential backoff with jitter
//!
//! A `SourceRateLimited` error (the external API itself signalling 429) is
//! surfaced distinctly so the scheduler can trip its circuit breaker.

mod cache;
mod error;
mod governor;
mod service;
mod source;

pub use cache::{CacheConfig, QuoteCache, QuoteClass};
pub use error::{MarketDataError, RateWindow};
pub use governor::{GovernorConfig, RateGovernor};
pub use service::MarketData;
pub use source::QuoteSource;
