//! Liveness endpoint.
//!
//! Answers from memory only: it never touches the scratch directory or the
//! converter, so a broken `fb2c` install still reports the process as up.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_healthcheck))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/healthcheck", get(get_healthcheck))
}

/// `GET /healthcheck`: always `200 {"status": "ok", "version": "..."}`
/// while the process serves requests.
#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses(
        (status = 200, description = "Process is up; says nothing about the converter", body = Value)
    )
)]
pub async fn get_healthcheck() -> Json<Value> {
    Json(json!({
        "status":  "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
