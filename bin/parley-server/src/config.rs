//! Server configuration, loaded from environment variables at startup.

use parley_core::Settings;

/// Runtime configuration for parley-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Attach a CORS layer to every route.
    pub enable_cors: bool,

    /// Comma-separated list of allowed CORS origins.
    /// `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_openapi: bool,

    /// Settings handed to the chat core.
    pub core: Settings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            enable_cors: true,
            cors_allowed_origins: None,
            enable_openapi: true,
            core: Settings::default(),
        }
    }
}

impl Config {
    /// Build [`Config`] from `PARLEY_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("PARLEY_BIND", "0.0.0.0:8000"),
            log_level: env_or("PARLEY_LOG", "info"),
            log_json: env_flag("PARLEY_LOG_JSON", false),
            enable_cors: env_flag("PARLEY_ENABLE_CORS", true),
            cors_allowed_origins: std::env::var("PARLEY_CORS_ORIGINS")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            enable_openapi: env_flag("PARLEY_ENABLE_OPENAPI", true),
            core: Settings::from_env(),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| parse_flag(&v).unwrap_or(default))
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
