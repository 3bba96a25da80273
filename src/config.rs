//! Runtime configuration read from the environment.

use crate::credential::{Credentials, DEFAULT_API_KEY_VAR};
use crate::error::Result;
use crate::image::providers::{GeminiBackend, DEFAULT_BASE_URL};
use std::path::PathBuf;
use std::time::Duration;

/// Overrides the history slot path.
pub const HISTORY_PATH_VAR: &str = "PIXELGEN_HISTORY";
/// Overrides the API base URL.
pub const API_BASE_VAR: &str = "PIXELGEN_API_BASE";
/// Per-request timeout in seconds; unset means no timeout.
pub const TIMEOUT_SECS_VAR: &str = "PIXELGEN_TIMEOUT_SECS";
/// Names the env var that holds the API key.
pub const API_KEY_VAR_VAR: &str = "PIXELGEN_API_KEY_VAR";

const HISTORY_FILE_NAME: &str = "pixelgen_history.json";

/// Settings shared by the library entry points and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// History slot file.
    pub history_path: PathBuf,
    /// Remote API base URL.
    pub api_base_url: String,
    /// Optional per-request timeout.
    pub request_timeout: Option<Duration>,
    /// Env var holding the API key.
    pub api_key_var: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
            api_key_var: DEFAULT_API_KEY_VAR.to_string(),
        }
    }
}

impl Config {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads configuration through `lookup`, falling back to defaults for
    /// unset or blank values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let request_timeout = get(TIMEOUT_SECS_VAR).and_then(|raw| match raw.trim().parse() {
            Ok(0) => None,
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(_) => {
                tracing::warn!(value = %raw, "ignoring invalid {TIMEOUT_SECS_VAR}");
                None
            }
        });

        Self {
            history_path: get(HISTORY_PATH_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.history_path),
            api_base_url: get(API_BASE_VAR).unwrap_or(defaults.api_base_url),
            request_timeout,
            api_key_var: get(API_KEY_VAR_VAR).unwrap_or(defaults.api_key_var),
        }
    }

    /// Builds the credential source described by this config.
    pub fn credentials(&self) -> Credentials {
        Credentials::from_env_var(self.api_key_var.clone())
    }

    /// Builds the Gemini backend described by this config.
    pub fn backend(&self) -> Result<GeminiBackend> {
        GeminiBackend::builder()
            .base_url(&self.api_base_url)
            .timeout(self.request_timeout)
            .build()
    }
}

/// `<data dir>/pixelgen/history.json`, or a file in the working directory
/// when the platform has no data dir.
fn default_history_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("pixelgen").join("history.json"))
        .unwrap_or_else(|| PathBuf::from(HISTORY_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.api_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.api_key_var, "API_KEY");
        assert!(config.history_path.ends_with("history.json")
            || config.history_path.ends_with(HISTORY_FILE_NAME));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            (HISTORY_PATH_VAR, "/tmp/pg/history.json"),
            (API_BASE_VAR, "http://localhost:9000/v1beta"),
            (TIMEOUT_SECS_VAR, "90"),
            (API_KEY_VAR_VAR, "GEMINI_API_KEY"),
        ]));
        assert_eq!(config.history_path, PathBuf::from("/tmp/pg/history.json"));
        assert_eq!(config.api_base_url, "http://localhost:9000/v1beta");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.api_key_var, "GEMINI_API_KEY");
    }

    #[test]
    fn test_blank_and_invalid_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            (API_BASE_VAR, "  "),
            (TIMEOUT_SECS_VAR, "soon"),
        ]));
        assert_eq!(config.api_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout, None);

        let config = Config::from_lookup(lookup(&[(TIMEOUT_SECS_VAR, "0")]));
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn test_backend_builds_from_config() {
        let config = Config::from_lookup(lookup(&[(TIMEOUT_SECS_VAR, "5")]));
        assert!(config.backend().is_ok());
    }
}
