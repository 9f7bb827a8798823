//! Symbol resolver seam.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A resolved, tradeable instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedInstrument {
    /// Concrete instrument string understood by the gateway.
    pub instrument: String,
    /// Contracts per lot.
    pub lot_size: u32,
    /// Minimum price increment.
    pub tick_size: Decimal,
}

/// Errors from symbol resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unresolved symbol: {logical}")]
    UnresolvedSymbol {
        /// The logical underlying that could not be resolved.
        logical: String,
    },
}

/// Maps a logical underlying plus spot hint to a concrete instrument.
///
/// Contract-naming and expiry-string generation live behind this seam.
#[async_trait]
pub trait SymbolResolver: Send + Sync {
    async fn resolve(
        &self,
        logical: &str,
        spot_hint: Decimal,
    ) -> Result<ResolvedInstrument, ResolveError>;
}

/// Fixed lookup-table resolver for tests and paper trading.
#[derive(Debug, Default)]
pub struct StaticSymbolResolver {
    entries: HashMap<String, ResolvedInstrument>,
}

impl StaticSymbolResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapping for a logical underlying.
    pub fn insert(&mut self, logical: impl Into<String>, resolved: ResolvedInstrument) {
        self.entries.insert(logical.into(), resolved);
    }
}

#[async_trait]
impl SymbolResolver for StaticSymbolResolver {
    async fn resolve(
        &self,
        logical: &str,
        _spot_hint: Decimal,
    ) -> Result<ResolvedInstrument, ResolveError> {
        self.entries
            .get(logical)
            .cloned()
            .ok_or_else(|| ResolveError::UnresolvedSymbol {
                logical: logical.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_static_resolver_hit() {
        let mut resolver = StaticSymbolResolver::new();
        resolver.insert(
            "NIFTY",
            ResolvedInstrument {
                instrument: "NIFTY24AUG22500CE".into(),
                lot_size: 75,
                tick_size: dec!(0.05),
            },
        );

        let resolved = resolver.resolve("NIFTY", dec!(22480)).await.unwrap();
        assert_eq!(resolved.instrument, "NIFTY24AUG22500CE");
        assert_eq!(resolved.lot_size, 75);
    }

    #[tokio::test]
    async fn test_static_resolver_miss() {
        let resolver = StaticSymbolResolver::new();
        let err = resolver.resolve("BANKNIFTY", dec!(50000)).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::UnresolvedSymbol { logical } if logical == "BANKNIFTY"
        ));
    }
}
