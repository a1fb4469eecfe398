//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use ebook_convert_core::{Converter, Workspace};

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Scratch directory where uploads and results live.
    pub workspace: Workspace,
    /// Converter invoked for every request.
    pub converter: Arc<dyn Converter>,
}
