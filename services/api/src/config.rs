//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

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
    pub bind_address: SocketAddr,
    pub log_level: Level,
    /// The chat/completions proxy every model request goes to.
    pub proxy_url: String,
    pub chat_model: String,
    pub chat_temperature: f32,
    pub study_temperature: f32,
    /// Server-side credential for the generation endpoint.
    pub openai_api_key: Option<String>,
    /// Where the chat client asks for study items.
    pub study_api_url: String,
    /// Directory holding the persisted JSON collections.
    pub data_dir: PathBuf,
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

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        // --- Load Model Settings ---
        let proxy_url = var("PROXY_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("PROXY_URL".to_string()))?;
        let chat_model = var("CHAT_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let chat_temperature = parse_temperature(&var, "CHAT_TEMPERATURE", 0.7)?;
        let study_temperature = parse_temperature(&var, "STUDY_TEMPERATURE", 0.6)?;

        // --- Load API Keys (as optional) ---
        let openai_api_key = var("OPENAI_API_KEY").filter(|key| !key.trim().is_empty());

        let study_api_url = var("STUDY_API_URL")
            .unwrap_or_else(|| "http://127.0.0.1:3000/api/generate-study-item".to_string());

        Ok(Self {
            bind_address,
            log_level,
            proxy_url,
            chat_model,
            chat_temperature,
            study_temperature,
            openai_api_key,
            study_api_url,
            data_dir,
        })
    }
}

fn parse_temperature<F>(var: &F, name: &str, default: f32) -> Result<f32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<f32>() {
        Ok(value) if (0.0..=2.0).contains(&value) => Ok(value),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a temperature between 0 and 2", raw),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_proxy_is_set() {
        let config = load(&[("PROXY_URL", "http://proxy.local/chat")]).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.chat_temperature, 0.7);
        assert_eq!(config.study_temperature, 0.6);
        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn missing_proxy_url_is_reported() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(name) if name == "PROXY_URL"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = load(&[("PROXY_URL", "http://p"), ("CHAT_TEMPERATURE", "hot")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "CHAT_TEMPERATURE"));

        let err = load(&[("PROXY_URL", "http://p"), ("BIND_ADDRESS", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "BIND_ADDRESS"));
    }

    #[test]
    fn blank_api_key_counts_as_unset() {
        let config = load(&[("PROXY_URL", "http://p"), ("OPENAI_API_KEY", "  ")]).unwrap();
        assert!(config.openai_api_key.is_none());
    }
}
