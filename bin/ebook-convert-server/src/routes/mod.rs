//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - Middleware layers (CORS, per-request trace id)
//! - Upload body limit
//! - Conversion routes (`POST /`, `POST /{format}`)
//! - Liveness route (`GET /healthcheck`)
//! - Optional OpenAPI document (disable with `EBOOK_ENABLE_OPENAPI=false`)
//! - Optional Prometheus metrics (disable with `EBOOK_ENABLE_METRICS=false`)

pub mod convert;
pub mod doc;
mod health;
mod metrics;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{middleware, Json, Router};
use tower::ServiceBuilder;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    // The multipart extractor enforces this limit; the raw-body route
    // counts bytes itself.
    let body_limit = usize::try_from(state.config.max_upload_bytes).unwrap_or(usize::MAX);

    let mut app = Router::new()
        .merge(health::router())
        .merge(convert::router())
        .layer(DefaultBodyLimit::max(body_limit));

    // Only the service routes are measured; scrapes of `/metrics` are not.
    if state.config.enable_metrics {
        app = app.layer(metrics::layer()).merge(metrics::router());
    }

    if state.config.enable_openapi {
        let api_doc = doc::get_docs();
        app = app.route(
            "/api-docs/openapi.json",
            get(move || {
                let api_doc = api_doc.clone();
                async move { Json(api_doc) }
            }),
        );
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
