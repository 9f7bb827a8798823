//! Broker-facing types and seams.
//!
//! This crate defines what the engine needs from the outside world:
//!
//! - **Order model**: `OrderSpec`, `OrderSide`, `OrderKind`, `OrderStatus`
//! - **Order events**: `OrderEvent`, delivered by push stream or recovery sweep
//! - **OrderGateway**: place/modify/cancel orders, stream status events
//! - **SymbolResolver**: logical underlying + spot hint to concrete instrument
//!
//! No wire format lives here; concrete adapters (REST, paper) implement the
//! traits.

mod event;
mod gateway;
mod order;
mod resolver;

pub use event::OrderEvent;
pub use gateway::{GatewayError, OrderGateway};
pub use order::{OrderKind, OrderSide, OrderSpec, OrderStatus};
pub use resolver::{ResolveError, ResolvedInstrument, StaticSymbolResolver, SymbolResolver};
