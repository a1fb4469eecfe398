//! Per-request trace id and access logging.
//!
//! Bodies pass through untouched: uploads and converted books are streamed,
//! so nothing here may buffer them.

use std::time::Instant;

use axum::{
    body::Body,
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

pub async fn trace_middleware(mut req: Request<Body>, next: Next) -> Response {
    let start_time = Instant::now();

    // Reuse the caller's trace id when it is a valid UUID.
    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");

        let header = HeaderValue::from_str(&trace_id.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("invalid"));
        req.headers_mut().insert(X_TRACE_ID, header.clone());

        let mut response = next.run(req).await;
        response.headers_mut().insert(X_TRACE_ID, header);

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response headers sent"
        );

        response
    }
    .instrument(span)
    .await
}
