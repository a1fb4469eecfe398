//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for ebook-convert-server.
///
/// Every field has a default so the server starts without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8080"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Shared scratch directory for uploads and converter output.
    pub work_dir: PathBuf,

    /// Path of the `fb2c` converter binary.
    pub converter_bin: PathBuf,

    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: u64,

    /// How often the janitor sweeps `work_dir`.
    pub janitor_interval: Duration,

    /// Age after which the janitor deletes an entry.
    pub janitor_max_age: Duration,

    /// Files deleted on every sweep regardless of age.
    pub janitor_extra_paths: Vec<PathBuf>,

    /// Comma-separated CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_openapi: bool,

    /// Record HTTP metrics and serve them at `/metrics`.
    pub enable_metrics: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("EBOOK_BIND", "0.0.0.0:8080"),
            log_level: env_or("EBOOK_LOG", "info"),
            log_json: env_flag("EBOOK_LOG_JSON", false),
            work_dir: std::env::var_os("EBOOK_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("ebook-convert")),
            converter_bin: PathBuf::from(env_or("EBOOK_CONVERTER_BIN", "./bin/fb2c")),
            max_upload_bytes: parse_env("EBOOK_MAX_UPLOAD_SIZE_MB", 100u64).saturating_mul(1024 * 1024),
            janitor_interval: Duration::from_secs(parse_env("EBOOK_JANITOR_INTERVAL_SECS", 5 * 60)),
            janitor_max_age: Duration::from_secs(parse_env("EBOOK_JANITOR_MAX_AGE_SECS", 3 * 3600)),
            janitor_extra_paths: split_list(&env_or("EBOOK_JANITOR_EXTRA_PATHS", ""))
                .map(PathBuf::from)
                .collect(),
            cors_allowed_origins: std::env::var("EBOOK_CORS_ORIGINS").ok(),
            enable_openapi: env_flag("EBOOK_ENABLE_OPENAPI", true),
            enable_metrics: env_flag("EBOOK_ENABLE_METRICS", true),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| parse_flag(&v))
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Non-empty, trimmed items of a comma-separated list.
pub(crate) fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}
