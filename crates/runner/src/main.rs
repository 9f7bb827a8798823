use std::sync::Arc;
use std::time::Duration;

use broker_core::OrderGateway;
use broker_rest::{ApiCredentials, RestOrderGateway, RestQuoteSource};
use common::TradingEnvironment;
use engine::{EngineConfig, MonitoringScheduler, PaperGateway};
use market_data::MarketData;
use metrics::create_metrics;
use tokio::sync::watch;
use tracing::{error, info};
use trading_state::MemoryStateStore;

/// Interval for periodic health status logging.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    common::init_logging();

    let environment = TradingEnvironment::from_env();
    let base_url = std::env::var("BROKER_BASE_URL")
        .unwrap_or_else(|_| "https://api.broker.example".to_string());
    let watchlist: Vec<String> = std::env::var("WATCHLIST")
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    info!(environment = %environment, base_url = %base_url, "starting monitoring engine");

    let metrics = create_metrics();

    let source = match RestQuoteSource::new(&base_url) {
        Ok(source) => Arc::new(source),
        Err(err) => {
            error!(error = %err, "failed to build quote source");
            return;
        }
    };
    let market = Arc::new(MarketData::with_defaults(source, metrics.clone()));

    let gateway: Arc<dyn OrderGateway> = if environment.is_live() {
        let credentials = match ApiCredentials::from_env() {
            Ok(credentials) => credentials,
            Err(err) => {
                error!(error = %err, "missing broker credentials for live trading");
                return;
            }
        };
        match RestOrderGateway::new(&base_url, credentials) {
            Ok(gateway) => Arc::new(gateway),
            Err(err) => {
                error!(error = %err, "failed to build order gateway");
                return;
            }
        }
    } else {
        info!("paper environment: orders will be simulated");
        Arc::new(PaperGateway::auto_filling())
    };

    let store = Arc::new(MemoryStateStore::new());
    let config = EngineConfig::default().with_watchlist(watchlist);
    let scheduler = Arc::new(MonitoringScheduler::new(
        store,
        market,
        gateway,
        config,
        metrics.clone(),
    ));

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn ctrl_c handler
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, initiating shutdown");
            let _ = shutdown_tx_clone.send(true);
        }
    });

    // Spawn periodic health reporter
    let health_metrics = metrics.clone();
    let mut health_shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEALTH_LOG_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let snapshot = health_metrics.snapshot();
                    info!(
                        status = %snapshot.health_status(),
                        ticks = snapshot.ticks,
                        user_passes = snapshot.user_passes,
                        cache_hit_rate = format!("{:.0}%", snapshot.cache_hit_rate * 100.0),
                        orders = snapshot.orders_placed,
                        exits = snapshot.exits,
                        errors = snapshot.cycle_errors,
                        "health check"
                    );
                }
                _ = health_shutdown_rx.changed() => {
                    if *health_shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });

    scheduler.run(shutdown_rx).await;

    // Print final metrics
    println!("\n{}", metrics.snapshot());
    info!("shutdown complete");
}
