//! Application configuration management.
//!
//! Configuration is read from `~/.config/storkval/config.json` when present.
//! Every field has a default, and `STORKVAL_*` environment variables
//! override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::api::client::{DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::format::{parse_timezone, DEFAULT_DISPLAY_TIMEZONE};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "storkval";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Persisted token file name in the cache directory
const TOKEN_FILE: &str = "bearer_token.json";

const ENV_PREFIX: &str = "STORKVAL_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub validation_interval_secs: u64,
    pub render_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub display_timezone: String,
    pub account_file: PathBuf,
    pub token_file: Option<PathBuf>,
    pub cognito_region: String,
    pub cognito_client_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            validation_interval_secs: 60,
            render_interval_ms: 1000,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            display_timezone: DEFAULT_DISPLAY_TIMEZONE.name().to_string(),
            account_file: PathBuf::from("account.json"),
            token_file: None,
            cognito_region: "ap-northeast-1".to_string(),
            cognito_client_id: "5msns4n49hmg3dftp2tp1t2iuh".to_string(),
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides looked up by key (without prefix), e.g. `API_BASE_URL`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = lookup("VALIDATION_INTERVAL_SECS") {
            self.validation_interval_secs = v
                .parse()
                .context("STORKVAL_VALIDATION_INTERVAL_SECS must be a number")?;
        }
        if let Some(v) = lookup("RENDER_INTERVAL_MS") {
            self.render_interval_ms = v
                .parse()
                .context("STORKVAL_RENDER_INTERVAL_MS must be a number")?;
        }
        if let Some(v) = lookup("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = v
                .parse()
                .context("STORKVAL_REQUEST_TIMEOUT_SECS must be a number")?;
        }
        if let Some(v) = lookup("DISPLAY_TIMEZONE") {
            self.display_timezone = v;
        }
        if let Some(v) = lookup("ACCOUNT_FILE") {
            self.account_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("TOKEN_FILE") {
            self.token_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("COGNITO_REGION") {
            self.cognito_region = v;
        }
        if let Some(v) = lookup("COGNITO_CLIENT_ID") {
            self.cognito_client_id = v;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.validation_interval_secs == 0 || self.render_interval_ms == 0 {
            anyhow::bail!("Intervals must be greater than zero");
        }
        self.timezone()?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Where the access token is persisted
    pub fn token_path(&self) -> Result<PathBuf> {
        match &self.token_file {
            Some(path) => Ok(path.clone()),
            None => Ok(self.cache_dir()?.join(TOKEN_FILE)),
        }
    }

    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.display_timezone)
            .ok_or_else(|| anyhow::anyhow!("Unknown timezone: {}", self.display_timezone))
    }

    pub fn validation_interval(&self) -> Duration {
        Duration::from_secs(self.validation_interval_secs)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.validation_interval(), Duration::from_secs(60));
        assert_eq!(config.render_interval(), Duration::from_secs(1));
        assert_eq!(config.timezone().unwrap(), chrono_tz::Asia::Jakarta);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"validation_interval_secs": 120}"#).unwrap();
        assert_eq!(config.validation_interval_secs, 120);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("API_BASE_URL", "http://localhost:8080"),
            ("VALIDATION_INTERVAL_SECS", "5"),
            ("TOKEN_FILE", "/tmp/token.json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.validation_interval_secs, 5);
        assert_eq!(config.token_path().unwrap(), PathBuf::from("/tmp/token.json"));
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == "RENDER_INTERVAL_MS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            display_timezone: "Nowhere/Special".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            validation_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
