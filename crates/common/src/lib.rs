//! Shared infrastructure: retry/backoff, logging, environment selection.

mod backoff;
mod environment;
mod logging;

pub use backoff::{retry, ExponentialBackoff, RetryPolicy};
pub use environment::{ParseEnvironmentError, TradingEnvironment};
pub use logging::init_logging;
