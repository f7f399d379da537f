//! Minimal ops surface: `/healthz` and a Prometheus `/metrics` exporter —
//! the two routes an ingestion service needs for liveness and scraping.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use crate::supervisor::Supervisor;

#[derive(Clone)]
struct ObservabilityState {
    supervisor: Arc<Supervisor>,
    prometheus: PrometheusHandle,
}

pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

pub async fn serve(port: u16, supervisor: Arc<Supervisor>, prometheus: PrometheusHandle) -> anyhow::Result<()> {
    let state = ObservabilityState { supervisor, prometheus };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "observability server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz(axum::extract::State(state): axum::extract::State<ObservabilityState>) -> impl axum::response::IntoResponse {
    if state.supervisor.all_healthy() {
        (axum::http::StatusCode::OK, "ok")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "degraded")
    }
}

async fn metrics(axum::extract::State(state): axum::extract::State<ObservabilityState>) -> String {
    state.prometheus.render()
}
