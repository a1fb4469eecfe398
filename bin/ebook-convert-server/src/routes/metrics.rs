//! Prometheus metrics.
//!
//! [`layer`] records request counts and latencies for the routes it wraps;
//! [`router`] exposes them in the Prometheus text format at `GET /metrics`.

use std::sync::{Arc, OnceLock};

use axum::routing::get;
use axum::Router;
use axum_prometheus::metrics_exporter_prometheus::PrometheusHandle;
use axum_prometheus::PrometheusMetricLayer;

use crate::state::AppState;

/// The exporter installs a process-wide recorder, which may happen only once
/// even when several routers are built (tests do).
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn handle() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let (_layer, handle) = PrometheusMetricLayer::pair();
            handle
        })
        .clone()
}

/// Middleware recording `axum_http_requests_*` series into the shared
/// recorder.
pub fn layer() -> PrometheusMetricLayer<'static> {
    // Make sure the recorder exists before the first request is measured.
    let _ = handle();
    PrometheusMetricLayer::new()
}

pub fn router() -> Router<Arc<AppState>> {
    let handle = handle();
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}
