//! Core configuration, loaded from environment variables at startup.

use std::path::PathBuf;

/// Settings consumed by the orchestrator and the backends.
///
/// Every field has a default so the core works without any environment
/// variables set. Build one value at startup and hand it to
/// [`ChatOrchestrator::new`](crate::ChatOrchestrator::new); nothing in the
/// crate reads the environment on its own.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Backend used when a request does not name one (default: `"local"`).
    pub backend_kind: String,

    /// Model identifier used when a request does not name one.
    /// A Hugging Face repo id or a local directory for the local backend,
    /// the served model name for the remote backend.
    pub model_name: String,

    /// Default generation budget in tokens.
    pub max_new_tokens: u32,

    /// Default sampling temperature.
    pub temperature: f32,

    /// Base URL of the OpenAI-compatible server, including the `/v1` suffix.
    pub remote_base_url: String,

    /// Bearer credential for the remote server. Empty means no header is sent.
    pub remote_api_key: String,

    /// Request timeout for the remote server, in seconds.
    pub remote_timeout_secs: u64,

    /// Directory holding one JSON character card per file.
    pub characters_dir: PathBuf,

    /// Text file with the instruction used when no persona is selected.
    pub system_prompt_path: PathBuf,

    /// Fixed sampling seed for local generation. `None` seeds from the clock.
    pub sampling_seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_kind: "local".to_owned(),
            model_name: "Qwen/Qwen2.5-0.5B-Instruct".to_owned(),
            max_new_tokens: 128,
            temperature: 0.9,
            remote_base_url: "http://localhost:8000/v1".to_owned(),
            remote_api_key: "EMPTY".to_owned(),
            remote_timeout_secs: 120,
            characters_dir: PathBuf::from("characters"),
            system_prompt_path: PathBuf::from("persona/ideas_guy.system.md"),
            sampling_seed: None,
        }
    }
}

impl Settings {
    /// Build [`Settings`] from `PARLEY_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend_kind: env_or("PARLEY_BACKEND", &defaults.backend_kind),
            model_name: env_or("PARLEY_MODEL", &defaults.model_name),
            max_new_tokens: parse_env("PARLEY_MAX_NEW_TOKENS", defaults.max_new_tokens),
            temperature: parse_env("PARLEY_TEMPERATURE", defaults.temperature),
            remote_base_url: env_or("PARLEY_REMOTE_BASE_URL", &defaults.remote_base_url),
            remote_api_key: env_or("PARLEY_REMOTE_API_KEY", &defaults.remote_api_key),
            remote_timeout_secs: parse_env(
                "PARLEY_REMOTE_TIMEOUT_SECS",
                defaults.remote_timeout_secs,
            ),
            characters_dir: env_or("PARLEY_CHARACTERS_DIR", "characters").into(),
            system_prompt_path: env_or("PARLEY_SYSTEM_PROMPT", "persona/ideas_guy.system.md")
                .into(),
            sampling_seed: std::env::var("PARLEY_SEED")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    /// Settings for tests and offline demos: stub backend, everything else default.
    pub fn stub() -> Self {
        Self {
            backend_kind: "stub".to_owned(),
            ..Self::default()
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

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.backend_kind, "local");
        assert_eq!(s.max_new_tokens, 128);
        assert!((s.temperature - 0.9).abs() < f32::EPSILON);
        assert_eq!(s.characters_dir, PathBuf::from("characters"));
        assert!(s.sampling_seed.is_none());
    }

    #[test]
    fn stub_settings_only_change_backend() {
        let s = Settings::stub();
        assert_eq!(s.backend_kind, "stub");
        assert_eq!(s.model_name, Settings::default().model_name);
    }

    #[test]
    fn parse_env_falls_back_on_missing_key() {
        let v: u32 = parse_env("PARLEY_TEST_DEFINITELY_UNSET_KEY", 7);
        assert_eq!(v, 7);
    }
}
