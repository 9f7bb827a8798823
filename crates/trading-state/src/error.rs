//! State and store error types.

use thiserror::Error;

use crate::status::TriggerStatus;

/// Errors raised by state mutations.
#[derive(Debug, Error)]
pub enum StateError {
    /// A status write violated the transition table.
    #[error("invalid transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: TriggerStatus,
        to: TriggerStatus,
    },

    /// A symbol id is not present in the user's state.
    #[error("unknown symbol: {id}")]
    UnknownSymbol { id: String },
}

/// Errors raised by the state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage failure.
    #[error("store backend error: {0}")]
    Backend(String),

    /// Persisted payload could not be (de)serialized.
    #[error("store serialization error: {0}")]
    Serialization(String),
}
