//! Hull Moving Average engine.
//!
//! Pure, deterministic price-series math with no I/O:
//!
//! - **WMA**: linearly weighted moving average, newest sample weighted highest
//! - **HMA**: reduced-lag smoothing, `WMA(2*WMA(n/2) - WMA(n), round(sqrt(n)))`
//! - **Crossover signals**: `Buy`/`Sell` fire only on the bar where the price
//!   first crosses the HMA; `Bullish`/`Bearish` while the condition holds
//! - **Trend strength**: directional persistence of the HMA over a lookback
//!
//! All values are `Option<Decimal>`: a window with insufficient history is
//! undefined, never zero.

mod hma;
mod signal;
mod trend;
mod wma;

pub use hma::{hma_latest, hma_multi, hma_series, smoothing_period};
pub use signal::{classify_latest, classify_series, SignalClass};
pub use trend::trend_strength;
pub use wma::{wma_latest, wma_series};
