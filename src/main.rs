use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::info;

use spreadgrid::config::Config;
use spreadgrid::discovery::{DiscoveryConfig, DiscoveryEngine};
use spreadgrid::logging::init_tracing;
use spreadgrid::model::MarketEvent;
use spreadgrid::observability;
use spreadgrid::publish::LoggingPublisher;
use spreadgrid::supervisor::Supervisor;
use spreadgrid::venues::bingx::BingXConnector;
use spreadgrid::venues::gateio::GateIoConnector;
use spreadgrid::venues::lbank::LBankConnector;
use spreadgrid::venues::okx::OkxConnector;
use spreadgrid::Connector;

/// Bounded per-connector event buffer: an older
/// book is superseded by a newer one anyway, so a modest bound is enough
/// headroom for bursty venues without unbounded memory growth.
const EVENT_CHANNEL_CAPACITY: usize = 4096;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let prometheus = observability::install_recorder().context("failed to install metrics recorder")?;

    let config = Config::from_env().context("failed to load configuration")?;
    info!("spreadgrid starting");

    let (event_tx, event_rx) = mpsc::channel::<MarketEvent>(EVENT_CHANNEL_CAPACITY);
    let (cancel_token, _root_watch) = spreadgrid::cancel_pair();

    let mut connectors: Vec<Arc<dyn Connector>> = Vec::new();

    if config.okx.enabled {
        connectors.push(Arc::new(OkxConnector::new(
            config.okx.rest_base_url.clone(),
            config.okx.ws_base_url.clone(),
            config.okx.credentials.clone(),
            event_tx.clone(),
            cancel_token.watch(),
        )));
    }
    if config.gateio.enabled {
        connectors.push(Arc::new(GateIoConnector::new(
            config.gateio.rest_base_url.clone(),
            config.gateio.ws_base_url.clone(),
            "usdt",
            config.gateio.credentials.clone(),
            event_tx.clone(),
            cancel_token.watch(),
        )));
    }
    if config.lbank.enabled {
        connectors.push(Arc::new(LBankConnector::new(
            config.lbank.rest_base_url.clone(),
            config.lbank.ws_base_url.clone(),
            config.lbank.credentials.clone(),
            event_tx.clone(),
            cancel_token.watch(),
        )));
    }
    if config.bingx.enabled {
        connectors.push(Arc::new(BingXConnector::new(
            config.bingx.rest_base_url.clone(),
            config.bingx.ws_base_url.clone(),
            config.bingx.credentials.clone(),
            event_tx.clone(),
            cancel_token.watch(),
        )));
    }
    drop(event_tx);

    let discovery_config = DiscoveryConfig {
        min_spread_bps: config.min_spread_bps,
        min_depth_usd_floor: config.min_depth_usd,
        publish_interval: std::time::Duration::from_millis(config.publish_interval_ms),
        top_k: config.top_k,
        freshness_window: std::time::Duration::from_secs(config.freshness_window_secs),
    };
    let discovery = Arc::new(DiscoveryEngine::new(discovery_config, Arc::new(LoggingPublisher)));

    let supervisor = Supervisor::new(connectors, discovery, cancel_token.clone());

    let observability_supervisor = supervisor.clone();
    let http_port = config.http_port;
    let observability_handle = tokio::spawn(async move {
        if let Err(e) = observability::serve(http_port, observability_supervisor, prometheus).await {
            tracing::error!(error = %e, "observability server exited");
        }
    });

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown_token.cancel();
        }
    });

    supervisor.run(event_rx).await;
    observability_handle.abort();

    Ok(())
}
