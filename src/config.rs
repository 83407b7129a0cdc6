use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::intake::ModelSettings;

/// Application-level constants
pub const APP_NAME: &str = "Pedicare";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_CHAT_MODEL: &str = "PEDICARE_CHAT_MODEL";
pub const ENV_SUMMARY_MODEL: &str = "PEDICARE_SUMMARY_MODEL";
pub const ENV_VISION_MODEL: &str = "PEDICARE_VISION_MODEL";
pub const ENV_LLM_TIMEOUT: &str = "PEDICARE_LLM_TIMEOUT_SECS";
pub const ENV_BIND_ADDR: &str = "PEDICARE_BIND_ADDR";
pub const ENV_DB_PATH: &str = "PEDICARE_DB_PATH";

/// Outbound model calls are abandoned after this many seconds.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Get the application data directory (platform data dir, then home).
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite database location.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("pedicare.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> String {
    "pedicare=info,tower_http=info".to_string()
}

/// Model access settings.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// `None` disables every AI operation (they answer "not configured").
    pub api_key: Option<String>,
    pub models: ModelSettings,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            models: ModelSettings::default(),
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
        }
    }
}

impl AiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = ModelSettings::default();

        let timeout_secs = match get(ENV_LLM_TIMEOUT) {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    key: ENV_LLM_TIMEOUT,
                    value: raw,
                })?,
            None => DEFAULT_LLM_TIMEOUT_SECS,
        };

        Ok(Self {
            api_key: get(ENV_API_KEY),
            models: ModelSettings {
                chat_model: get(ENV_CHAT_MODEL).unwrap_or(defaults.chat_model),
                summary_model: get(ENV_SUMMARY_MODEL).unwrap_or(defaults.summary_model),
                vision_model: get(ENV_VISION_MODEL).unwrap_or(defaults.vision_model),
            },
            timeout_secs,
        })
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_addr = lookup(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid {
                key: ENV_BIND_ADDR,
                value: raw_addr.clone(),
            })?;
        let db_path = lookup(ENV_DB_PATH)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);
        Ok(Self { bind_addr, db_path })
    }
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn ai_defaults_without_environment() {
        let config = AiConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.models.chat_model, "gemini-flash-latest");
        assert_eq!(config.models.vision_model, "gemini-2.5-flash-lite");
    }

    #[test]
    fn ai_overrides_and_blank_key() {
        let config = AiConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "   "),
            (ENV_VISION_MODEL, "gemini-2.5-pro"),
            (ENV_LLM_TIMEOUT, "15"),
        ]))
        .unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.models.vision_model, "gemini-2.5-pro");
        assert_eq!(config.timeout_secs, 15);
    }

    #[test]
    fn ai_rejects_bad_timeout() {
        for bad in ["soon", "0", "-5"] {
            let err = AiConfig::from_lookup(lookup(&[(ENV_LLM_TIMEOUT, bad)])).unwrap_err();
            assert!(err.to_string().contains(ENV_LLM_TIMEOUT));
        }
    }

    #[test]
    fn server_config_parses_address_and_path() {
        let config = ServerConfig::from_lookup(lookup(&[
            (ENV_BIND_ADDR, "0.0.0.0:9000"),
            (ENV_DB_PATH, "/var/lib/pedicare/clinic.db"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/pedicare/clinic.db"));

        assert!(ServerConfig::from_lookup(lookup(&[(ENV_BIND_ADDR, "localhost")])).is_err());
    }

    #[test]
    fn default_db_path_under_app_data() {
        let path = default_db_path();
        assert!(path.starts_with(app_data_dir()));
        assert!(path.ends_with("pedicare.db"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
