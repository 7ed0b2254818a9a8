//! # Configuration
//!
//! TOML configuration for the `statbits` binary and for building exchange
//! coordinators.
//!
//! ```toml
//! [exchange]
//! timeout_ms = 10000
//! # correlation_seed = 1000   # fixed first correlation id; random when absent
//!
//! [locale]
//! language = "english"        # e.g. "French", "Portuguese (Brazil)"
//!
//! [logging]
//! level = "info"
//! file = "statbits.log"
//! ```
//!
//! Every section has defaults, so a partial file (or `[exchange]` alone) loads.
//! [`Config::load`] validates after parsing.
//!
//! ```rust,no_run
//! use statbits::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("statbits.toml").await?;
//!     let config = Config::load("statbits.toml").await?;
//!     println!("timeout: {}ms", config.exchange.timeout_ms);
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::schema::locale::FALLBACK_LANGUAGE;

/// Shortest reply window accepted from configuration.
pub const MIN_TIMEOUT_MS: u64 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub locale: LocaleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// How long a fetch or write waits for its reply (ms). Must be >= 100.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// First correlation id to allocate. Random when unset; 0 is never used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_seed: Option<u64>,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            correlation_seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// English name of the preferred display language.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    FALLBACK_LANGUAGE.to_string()
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: Some("statbits.log".to_string()),
        }
    }
}

impl Config {
    /// Load and validate configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config
            .validate()
            .map_err(|e| anyhow!("Invalid config file {}: {}", path, e))?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.exchange.timeout_ms < MIN_TIMEOUT_MS {
            return Err(anyhow!(
                "exchange.timeout_ms must be >= {} (got {})",
                MIN_TIMEOUT_MS,
                self.exchange.timeout_ms
            ));
        }
        if self.exchange.correlation_seed == Some(0) {
            return Err(anyhow!("exchange.correlation_seed must be non-zero"));
        }
        if self.locale.language.trim().is_empty() {
            return Err(anyhow!("locale.language must not be empty"));
        }
        match self.logging.level.to_ascii_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" | "off" => {}
            other => return Err(anyhow!("logging.level '{}' is not a log level", other)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.exchange.timeout_ms, 10_000);
        assert_eq!(config.exchange.correlation_seed, None);
        assert_eq!(config.locale.language, "english");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = toml::from_str("[exchange]\ntimeout_ms = 2500\n").unwrap();
        assert_eq!(config.exchange.timeout_ms, 2500);
        assert_eq!(config.locale.language, "english");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = Config::default();
        config.exchange.timeout_ms = 50;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.exchange.correlation_seed = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "loud".into();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("loud"), "{err}");
    }

    #[tokio::test]
    async fn default_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statbits.toml");
        let path = path.to_str().unwrap();

        Config::create_default(path).await.unwrap();
        let loaded = Config::load(path).await.unwrap();
        assert_eq!(loaded.exchange.timeout_ms, 10_000);
        assert_eq!(loaded.logging.file.as_deref(), Some("statbits.log"));
    }

    #[tokio::test]
    async fn load_reports_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        tokio::fs::write(&path, "[exchange]\ntimeout_ms = 5\n").await.unwrap();
        let err = Config::load(path.to_str().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("timeout_ms"));
    }
}
