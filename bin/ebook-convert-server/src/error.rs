//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON-body response
//! with the right status code.
//!
//! Caller mistakes and converter failures are 4xx. Anything else is a 500
//! whose detail (paths, subprocess output, io errors) only goes to the log.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ebook_convert_core::CoreError;
use http_body_util::LengthLimitError;
use thiserror::Error;
use tracing::error;

use crate::schemas::convert::ErrorBody;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller sent an invalid or incomplete request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The converter exited non-zero or printed diagnostics.
    #[error("conversion failed")]
    ConversionFailed,

    /// The upload is larger than the configured limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Launch or filesystem failure inside the service.
    #[error("core error: {0}")]
    Core(CoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::ConversionFailed => {
                (StatusCode::BAD_REQUEST, "conversion failed".to_owned())
            }
            ServerError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),
            ServerError::Core(e) => {
                error!(error = %e, "conversion pipeline error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(ErrorBody { error: client_message })).into_response()
    }
}

impl From<CoreError> for ServerError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnsupportedFormat(_) => ServerError::BadRequest(e.to_string()),
            other => ServerError::Core(other),
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::Core(CoreError::Io(e))
    }
}

impl From<MultipartError> for ServerError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(e.body_text())
        } else {
            ServerError::BadRequest(format!("failed to read multipart form: {}", e.body_text()))
        }
    }
}

impl From<axum::Error> for ServerError {
    fn from(e: axum::Error) -> Self {
        // The body limit surfaces as a `LengthLimitError` somewhere in the chain.
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&e);
        while let Some(err) = source {
            if err.is::<LengthLimitError>() {
                return ServerError::PayloadTooLarge("upload exceeds the configured limit".into());
            }
            source = err.source();
        }
        ServerError::BadRequest(format!("failed to read request body: {e}"))
    }
}
