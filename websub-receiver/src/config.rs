//! Configuration module for environment variable parsing.
//!
//! Every setting has a default so the receiver starts with no environment at
//! all, storing notifications under `./data`.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

/// Which object store backs the ingestion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Filesystem,
    Http,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "filesystem" | "fs" => Ok(StorageBackend::Filesystem),
            "http" => Ok(StorageBackend::Http),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Route the webhook is served on
    pub webhook_path: String,

    /// Service name attached to request spans and startup logs
    pub service_name: String,

    // =========================================================================
    // Storage
    // =========================================================================

    /// Object store backend
    pub storage_backend: StorageBackend,

    /// Root directory for the filesystem backend
    pub storage_dir: PathBuf,

    /// Base URL for the HTTP backend
    pub storage_url: Option<String>,

    /// Bearer token for the HTTP backend
    pub storage_token: Option<String>,

    /// HTTP backend request timeout in milliseconds
    pub storage_timeout_ms: u64,

    // =========================================================================
    // Signature verification
    // =========================================================================

    /// Shared secret registered with the hub (`hub.secret`)
    pub websub_secret: Option<String>,

    /// Upper bound on a body buffered for signature verification
    pub max_signed_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            webhook_path: "/".to_string(),
            service_name: "websub-receiver".to_string(),
            storage_backend: StorageBackend::Filesystem,
            storage_dir: PathBuf::from("./data"),
            storage_url: None,
            storage_token: None,
            storage_timeout_ms: 30_000,
            websub_secret: None,
            max_signed_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: parse_or("PORT", defaults.port),

            webhook_path: env::var("WEBHOOK_PATH")
                .ok()
                .map(|raw| {
                    normalize_path(&raw).unwrap_or_else(|| {
                        warn!(env_var = "WEBHOOK_PATH", value = %raw, "Invalid path, using /");
                        "/".to_string()
                    })
                })
                .unwrap_or(defaults.webhook_path),

            service_name: non_empty("SERVICE_NAME").unwrap_or(defaults.service_name),

            storage_backend: parse_or("STORAGE_BACKEND", defaults.storage_backend),

            storage_dir: non_empty("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),

            storage_url: non_empty("STORAGE_URL"),

            storage_token: non_empty("STORAGE_TOKEN"),

            storage_timeout_ms: parse_or("STORAGE_TIMEOUT_MS", defaults.storage_timeout_ms),

            websub_secret: non_empty("WEBSUB_SECRET"),

            max_signed_body_bytes: parse_or(
                "MAX_SIGNED_BODY_BYTES",
                defaults.max_signed_body_bytes,
            ),
        }
    }
}

/// Parse an environment variable, warning and falling back on bad values.
fn parse_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
{
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Read an environment variable, treating blank values as unset.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Normalize a webhook route to a leading-slash literal path.
///
/// Returns `None` for paths the router would read as captures or wildcards
/// (`:` or `*`), which must stay literal routes.
pub fn normalize_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.contains([':', '*']) {
        return None;
    }
    if trimmed.starts_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("/{}", trimmed))
    }
}
