//! Prometheus metrics recording and endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use posterflow_core::Result;
use posterflow_jobs::Generation;

use crate::state::GatewayState;

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {e}"))
}

/// Record a finished generation request by mode and outcome.
pub fn record_generation(generation: &Result<Generation>) {
    let (mode, outcome) = match generation {
        Ok(g) if g.result.is_empty() => (g.mode.as_str(), "empty"),
        Ok(g) => (g.mode.as_str(), "ok"),
        Err(e) => ("unknown", e.kind()),
    };
    let labels = [("mode", mode.to_string()), ("outcome", outcome.to_string())];
    metrics::counter!("generation_requests_total", &labels).increment(1);

    if let Ok(g) = generation {
        metrics::histogram!("generation_poll_attempts").record(f64::from(g.polls));
    }
}

/// Record an error of a given kind.
pub fn record_error(kind: &str) {
    let labels = [("kind", kind.to_string())];
    metrics::counter!("errors_total", &labels).increment(1);
}

pub async fn metrics_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}
