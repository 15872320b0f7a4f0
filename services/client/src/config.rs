//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// The delay between a successful upload and the switch to the results tab.
pub const DEFAULT_UPLOAD_REDIRECT: Duration = Duration::from_millis(1500);

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub log_level: Level,
    pub session_path: PathBuf,
    pub upload_redirect_delay: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Backend ---
        let api_url = lookup("COMPARE_BOT_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::MissingVar("COMPARE_BOT_API_URL".to_string()))?;
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "COMPARE_BOT_API_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_url),
            ));
        }

        // --- Logging ---
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Durable session storage ---
        let session_path = lookup("COMPARE_BOT_SESSION_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_session_path);

        // --- Upload workflow ---
        let upload_redirect_delay = match lookup("COMPARE_BOT_UPLOAD_REDIRECT_MS") {
            Some(raw) => raw.trim().parse::<u64>().map(Duration::from_millis).map_err(|_| {
                ConfigError::InvalidValue(
                    "COMPARE_BOT_UPLOAD_REDIRECT_MS".to_string(),
                    format!("'{}' is not a number of milliseconds", raw),
                )
            })?,
            None => DEFAULT_UPLOAD_REDIRECT,
        };

        Ok(Self {
            api_url,
            log_level,
            session_path,
            upload_redirect_delay,
        })
    }
}

fn default_session_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("compare_bot")
        .join("session.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_url_is_set() {
        let config =
            Config::from_lookup(lookup(&[("COMPARE_BOT_API_URL", "http://localhost:8000/")]))
                .unwrap();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.upload_redirect_delay, DEFAULT_UPLOAD_REDIRECT);
        assert!(config.session_path.ends_with("compare_bot/session.json"));
    }

    #[test]
    fn api_url_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "COMPARE_BOT_API_URL"));
    }

    #[test]
    fn rejects_bad_values() {
        let err = Config::from_lookup(lookup(&[("COMPARE_BOT_API_URL", "ftp://x")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));

        let err = Config::from_lookup(lookup(&[
            ("COMPARE_BOT_API_URL", "https://api.example.com"),
            ("RUST_LOG", "chatty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "RUST_LOG"));

        let err = Config::from_lookup(lookup(&[
            ("COMPARE_BOT_API_URL", "https://api.example.com"),
            ("COMPARE_BOT_UPLOAD_REDIRECT_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));
    }

    #[test]
    fn overrides_are_honoured() {
        let config = Config::from_lookup(lookup(&[
            ("COMPARE_BOT_API_URL", "https://api.example.com"),
            ("RUST_LOG", "debug"),
            ("COMPARE_BOT_SESSION_PATH", "/tmp/cb.json"),
            ("COMPARE_BOT_UPLOAD_REDIRECT_MS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.session_path, PathBuf::from("/tmp/cb.json"));
        assert_eq!(config.upload_redirect_delay, Duration::ZERO);
    }
}
