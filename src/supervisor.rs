//! Supervisor: owns connectors and the discovery
//! engine, propagates one cancellation signal, and periodically checks
//! that every connector session is `Subscribed`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::connector::Connector;
use crate::discovery::DiscoveryEngine;
use crate::model::MarketEvent;

/// Interval between connector-health sweeps: a periodic check that each
/// connector's sessions are still in the `Subscribed` state.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

pub struct Supervisor {
    connectors: Vec<Arc<dyn Connector>>,
    discovery: Arc<DiscoveryEngine>,
    cancel_token: CancelToken,
    unhealthy_sweeps: AtomicU64,
    last_errors: Mutex<Vec<String>>,
}

impl Supervisor {
    /// `cancel_token` must be the same token used to construct every
    /// connector's session, so that `shutdown()` actually reaches them
    /// (a connector's `run()` rides its session's own stored watch, not
    /// the one threaded back through this call).
    pub fn new(
        connectors: Vec<Arc<dyn Connector>>,
        discovery: Arc<DiscoveryEngine>,
        cancel_token: CancelToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            connectors,
            discovery,
            cancel_token,
            unhealthy_sweeps: AtomicU64::new(0),
            last_errors: Mutex::new(Vec::new()),
        })
    }

    pub fn all_healthy(&self) -> bool {
        self.connectors.iter().all(|c| c.is_healthy())
    }

    /// Recent error strings accumulated for operator-visible logging
    ///
    pub fn recent_errors(&self) -> Vec<String> {
        self.last_errors.lock().clone()
    }

    fn record_error(&self, message: String) {
        let mut errors = self.last_errors.lock();
        errors.push(message);
        if errors.len() > 50 {
            errors.remove(0);
        }
    }

    /// Runs every connector, the discovery engine, and the health sweep
    /// until the shared cancellation token fires.
    pub async fn run(self: &Arc<Self>, events: mpsc::Receiver<MarketEvent>) {
        let mut handles = Vec::new();

        for connector in &self.connectors {
            let connector = connector.clone();
            let cancel = self.cancel_token.watch();
            handles.push(tokio::spawn(async move {
                connector.run(cancel).await;
            }));
        }

        {
            let discovery = self.discovery.clone();
            let cancel = self.cancel_token.watch();
            handles.push(tokio::spawn(async move {
                discovery.run(events, cancel).await;
            }));
        }

        let supervisor = self.clone();
        let mut cancel = self.cancel_token.watch();
        let health_loop = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEALTH_CHECK_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => supervisor.sweep_health(),
                }
            }
        });
        handles.push(health_loop);

        for handle in handles {
            let _ = handle.await;
        }
    }

    fn sweep_health(&self) {
        let mut any_unhealthy = false;
        for connector in &self.connectors {
            if !connector.is_healthy() {
                any_unhealthy = true;
                let message = format!("{} session not Subscribed", connector.exchange_id());
                warn!(exchange_id = %connector.exchange_id(), "connector unhealthy");
                self.record_error(message);
                connector.reconnect();
            }
        }
        if any_unhealthy {
            self.unhealthy_sweeps.fetch_add(1, Ordering::Relaxed);
        } else {
            info!("all connectors healthy");
        }
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}
