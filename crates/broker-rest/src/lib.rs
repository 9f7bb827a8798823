//! REST adapter for the broker's HTTP API.
//!
//! Implements the `QuoteSource` and `OrderGateway` seams over HTTP:
//!
//! - **HttpClient**: thin reqwest wrapper with typed errors and rate-limit
//!   and auth detection
//! - **ApiCredentials / RequestSigner**: secret handling and HMAC-SHA256
//!   request signing
//! - **RestQuoteSource**: batched quotes and historical candles
//! - **RestOrderGateway**: order placement/modify/cancel, status recovery,
//!   and a polling event pump
//!
//! All wire formats live in this crate; the engine never sees them.

mod auth;
mod gateway;
mod http;
mod quotes;

pub use auth::{ApiCredentials, AuthError, RequestSigner};
pub use gateway::RestOrderGateway;
pub use http::{HttpClient, RestError};
pub use quotes::RestQuoteSource;
