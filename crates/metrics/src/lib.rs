use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe metrics collector for the monitoring engine.
#[derive(Debug)]
pub struct EngineMetrics {
    // Counters
    ticks: AtomicU64,
    user_passes: AtomicU64,
    quote_fetches: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    governor_rejections: AtomicU64,
    breaker_trips: AtomicU64,
    orders_placed: AtomicU64,
    orders_modified: AtomicU64,
    orders_rejected: AtomicU64,
    fills: AtomicU64,
    exits: AtomicU64,
    cycle_errors: AtomicU64,

    // Timestamps
    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_tick_time: Option<Instant>,
    last_error_time: Option<Instant>,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            user_passes: AtomicU64::new(0),
            quote_fetches: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            governor_rejections: AtomicU64::new(0),
            breaker_trips: AtomicU64::new(0),
            orders_placed: AtomicU64::new(0),
            orders_modified: AtomicU64::new(0),
            orders_rejected: AtomicU64::new(0),
            fills: AtomicU64::new(0),
            exits: AtomicU64::new(0),
            cycle_errors: AtomicU64::new(0),
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_tick_time: None,
                last_error_time: None,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_ticks(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_tick_time = Some(Instant::now());
    }

    pub fn inc_user_passes(&self) {
        self.user_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_quote_fetches(&self) {
        self.quote_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_governor_rejections(&self) {
        self.governor_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_breaker_trips(&self) {
        self.breaker_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_orders_placed(&self) {
        self.orders_placed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_orders_modified(&self) {
        self.orders_modified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_orders_rejected(&self) {
        self.orders_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fills(&self) {
        self.fills.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_exits(&self) {
        self.exits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cycle_errors(&self) {
        self.cycle_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    // --- Getter methods ---

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn user_passes(&self) -> u64 {
        self.user_passes.load(Ordering::Relaxed)
    }

    pub fn quote_fetches(&self) -> u64 {
        self.quote_fetches.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn governor_rejections(&self) -> u64 {
        self.governor_rejections.load(Ordering::Relaxed)
    }

    pub fn breaker_trips(&self) -> u64 {
        self.breaker_trips.load(Ordering::Relaxed)
    }

    pub fn orders_placed(&self) -> u64 {
        self.orders_placed.load(Ordering::Relaxed)
    }

    pub fn orders_modified(&self) -> u64 {
        self.orders_modified.load(Ordering::Relaxed)
    }

    pub fn orders_rejected(&self) -> u64 {
        self.orders_rejected.load(Ordering::Relaxed)
    }

    pub fn fills(&self) -> u64 {
        self.fills.load(Ordering::Relaxed)
    }

    pub fn exits(&self) -> u64 {
        self.exits.load(Ordering::Relaxed)
    }

    pub fn cycle_errors(&self) -> u64 {
        self.cycle_errors.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.read().start_time.elapsed().as_secs_f64()
    }

    pub fn secs_since_last_tick(&self) -> Option<f64> {
        self.inner
            .read()
            .last_tick_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_error(&self) -> Option<f64> {
        self.inner
            .read()
            .last_error_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    /// Cache hit rate in [0, 1], or 0 before any lookup.
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits() as f64;
        let total = hits + self.cache_misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }

    /// Generate a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks(),
            user_passes: self.user_passes(),
            quote_fetches: self.quote_fetches(),
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
            cache_hit_rate: self.cache_hit_rate(),
            governor_rejections: self.governor_rejections(),
            breaker_trips: self.breaker_trips(),
            orders_placed: self.orders_placed(),
            orders_modified: self.orders_modified(),
            orders_rejected: self.orders_rejected(),
            fills: self.fills(),
            exits: self.exits(),
            cycle_errors: self.cycle_errors(),
            uptime_secs: self.uptime_secs(),
            secs_since_last_tick: self.secs_since_last_tick(),
            secs_since_last_error: self.secs_since_last_error(),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub user_passes: u64,
    pub quote_fetches: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub governor_rejections: u64,
    pub breaker_trips: u64,
    pub orders_placed: u64,
    pub orders_modified: u64,
    pub orders_rejected: u64,
    pub fills: u64,
    pub exits: u64,
    pub cycle_errors: u64,
    pub uptime_secs: f64,
    pub secs_since_last_tick: Option<f64>,
    pub secs_since_last_error: Option<f64>,
}

/// Health status of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Scheduler is ticking normally.
    Healthy,
    /// Ticks are stale (e.g., circuit breaker pause or slow passes).
    Degraded,
    /// No ticks for an extended period.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

impl MetricsSnapshot {
    /// Threshold in seconds for considering the scheduler stale.
    const STALE_THRESHOLD_SECS: f64 = 30.0;
    /// Threshold in seconds for considering the engine unhealthy.
    const UNHEALTHY_THRESHOLD_SECS: f64 = 120.0;

    /// Determine the health status based on tick recency.
    pub fn health_status(&self) -> HealthStatus {
        let secs_since_tick = match self.secs_since_last_tick {
            Some(secs) => secs,
            None => {
                // No ticks yet - if uptime is short, we're still starting up
                if self.uptime_secs < Self::STALE_THRESHOLD_SECS {
                    return HealthStatus::Healthy;
                } else if self.uptime_secs < Self::UNHEALTHY_THRESHOLD_SECS {
                    return HealthStatus::Degraded;
                } else {
                    return HealthStatus::Unhealthy;
                }
            }
        };

        if secs_since_tick > Self::UNHEALTHY_THRESHOLD_SECS {
            HealthStatus::Unhealthy
        } else if secs_since_tick > Self::STALE_THRESHOLD_SECS {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Engine Metrics ===")?;
        writeln!(f, "Uptime:              {:.1}s", self.uptime_secs)?;
        writeln!(f, "Ticks:               {}", self.ticks)?;
        writeln!(f, "User passes:         {}", self.user_passes)?;
        writeln!(f, "Quote fetches:       {}", self.quote_fetches)?;
        writeln!(f, "Cache hit rate:      {:.0}%", self.cache_hit_rate * 100.0)?;
        writeln!(f, "Governor rejections: {}", self.governor_rejections)?;
        writeln!(f, "Breaker trips:       {}", self.breaker_trips)?;
        writeln!(f, "Orders placed:       {}", self.orders_placed)?;
        writeln!(f, "Orders modified:     {}", self.orders_modified)?;
        writeln!(f, "Orders rejected:     {}", self.orders_rejected)?;
        writeln!(f, "Fills:               {}", self.fills)?;
        writeln!(f, "Exits:               {}", self.exits)?;
        writeln!(f, "Cycle errors:        {}", self.cycle_errors)?;
        if let Some(secs) = self.secs_since_last_tick {
            writeln!(f, "Since last tick:     {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_error {
            writeln!(f, "Since last error:    {:.1}s", secs)?;
        }
        Ok(())
    }
}

/// Shared handle to metrics.
pub type SharedMetrics = Arc<EngineMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(EngineMetrics::new())
}
