//! ebook-convert-core – request-independent building blocks of the
//! conversion service.
//!
//! - [`workspace`]: per-request scratch file naming and scoped cleanup.
//! - [`converter`]: the [`Converter`] capability and the `fb2c` subprocess
//!   implementation.
//! - [`janitor`]: the periodic sweep of the shared scratch directory.

pub mod converter;
pub mod error;
pub mod format;
pub mod janitor;
pub mod workspace;

pub use converter::{ConversionOutcome, Converter, Fb2cConverter, CONVERTER_LOG};
pub use error::CoreError;
pub use format::BookFormat;
pub use janitor::{Janitor, JanitorConfig, SweepReport};
pub use workspace::{ScratchFile, Workspace, WorkspaceEntry};
