use std::sync::Arc;

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

use crate::config::split_list;
use crate::state::AppState;

pub fn cors_layer(state: Arc<AppState>) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_allowed_origins
        .as_deref()
        .map(|raw| split_list(raw).filter_map(|s| s.parse().ok()).collect())
        .unwrap_or_default();

    // Wildcard when unset or unparsable; set EBOOK_CORS_ORIGINS in production.
    let cors = CorsLayer::new().allow_headers(Any).allow_methods(Any);
    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}
