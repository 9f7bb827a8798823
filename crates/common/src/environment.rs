//! Trading environment selection.
//!
//! Paper mode routes orders to the simulated gateway; live mode routes them
//! to the broker.

use std::fmt;
use std::str::FromStr;

/// Trading environment (paper or live).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradingEnvironment {
    /// Simulated fills, no broker orders.
    #[default]
    Paper,
    /// Real orders against the broker.
    Live,
}

impl TradingEnvironment {
    /// Returns true if orders are routed to the broker.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Returns true if orders are simulated.
    pub fn is_paper(&self) -> bool {
        matches!(self, Self::Paper)
    }

    /// Load environment from `TRADING_ENVIRONMENT` env var.
    ///
    /// Returns `Paper` if not set or invalid.
    pub fn from_env() -> Self {
        std::env::var("TRADING_ENVIRONMENT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for TradingEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paper => write!(f, "paper"),
            Self::Live => write!(f, "live"),
        }
    }
}

impl FromStr for TradingEnvironment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paper" | "dry" | "sim" => Ok(Self::Paper),
            "live" | "prod" | "production" => Ok(Self::Live),
            _ => Err(ParseEnvironmentError(s.to_string())),
        }
    }
}

/// Error parsing environment string.
#[derive(Debug, Clone)]
pub struct ParseEnvironmentError(String);

impl fmt::Display for ParseEnvironmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid environment '{}', expected 'paper' or 'live'", self.0)
    }
}

impl std::error::Error for ParseEnvironmentError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paper() {
        assert_eq!(
            "paper".parse::<TradingEnvironment>().unwrap(),
            TradingEnvironment::Paper
        );
        assert_eq!(
            "SIM".parse::<TradingEnvironment>().unwrap(),
            TradingEnvironment::Paper
        );
    }

    #[test]
    fn test_parse_live() {
        assert_eq!(
            "live".parse::<TradingEnvironment>().unwrap(),
            TradingEnvironment::Live
        );
        assert_eq!(
            "production".parse::<TradingEnvironment>().unwrap(),
            TradingEnvironment::Live
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!("invalid".parse::<TradingEnvironment>().is_err());
    }

    #[test]
    fn test_default_is_paper() {
        assert_eq!(TradingEnvironment::default(), TradingEnvironment::Paper);
        assert!(TradingEnvironment::default().is_paper());
    }

    #[test]
    fn test_display() {
        assert_eq!(TradingEnvironment::Paper.to_string(), "paper");
        assert_eq!(TradingEnvironment::Live.to_string(), "live");
    }
}
