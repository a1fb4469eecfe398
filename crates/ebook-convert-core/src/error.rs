use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the conversion building blocks.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested output format is not in the allow-list.
    #[error("unsupported format '{0}'; must be one of: epub, mobi")]
    UnsupportedFormat(String),

    /// The converter binary could not be started at all.
    #[error("failed to launch converter '{}': {source}", .binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
