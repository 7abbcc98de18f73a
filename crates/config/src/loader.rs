//! Configuration loader

use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::{GatewayKind, LexvaultConfig};

/// Environment variables that override file values
pub const ENV_DATABASE_URL: &str = "LEXVAULT_DATABASE_URL";
pub const ENV_LISTEN: &str = "LEXVAULT_LISTEN";
pub const ENV_LOG: &str = "LEXVAULT_LOG";

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found
    #[error("config file not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error
    #[error("validation error: {0}")]
    Validation(String),
}

/// Loads, overrides and validates a [`LexvaultConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config: LexvaultConfig,
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let mut loader = Self::load_str(&content)?;
        loader.config_path = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(loader)
    }

    /// Load configuration from string
    pub fn load_str(content: &str) -> Result<Self, ConfigError> {
        let config: LexvaultConfig = toml::from_str(content)?;
        Self::validate(&config)?;

        Ok(Self {
            config,
            config_path: None,
        })
    }

    /// File if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_file(path),
            None => Ok(Self::new()),
        }
    }

    /// Applies `LEXVAULT_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, then re-validates.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.config.database.url = url;
        }
        if let Some(listen) = lookup(ENV_LISTEN) {
            self.config.server.listen = listen.parse().map_err(|_| {
                ConfigError::Validation(format!("{} is not a socket address: {}", ENV_LISTEN, listen))
            })?;
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.config.logging.level = level;
        }
        Self::validate(&self.config)?;
        Ok(self)
    }

    pub fn get(&self) -> &LexvaultConfig {
        &self.config
    }

    pub fn path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn into_config(self) -> LexvaultConfig {
        self.config
    }

    /// Validate configuration
    pub fn validate(config: &LexvaultConfig) -> Result<(), ConfigError> {
        if config.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url is empty".to_string()));
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }

        let escrow = &config.escrow;
        if escrow.auto_release_grace_hours < 0 {
            return Err(ConfigError::Validation(
                "escrow.auto_release_grace_hours cannot be negative".to_string(),
            ));
        }
        if escrow.sweep_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "escrow.sweep_interval_secs must be positive".to_string(),
            ));
        }
        if escrow.commission_rate < Decimal::ZERO || escrow.commission_rate >= Decimal::ONE {
            return Err(ConfigError::Validation(format!(
                "escrow.commission_rate must be in [0, 1), got {}",
                escrow.commission_rate
            )));
        }

        let withdrawal = &config.withdrawal;
        if withdrawal.currency.len() != 3
            || !withdrawal.currency.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(ConfigError::Validation(format!(
                "withdrawal.currency must be a 3-letter code, got '{}'",
                withdrawal.currency
            )));
        }
        if withdrawal.min_amount <= Decimal::ZERO {
            return Err(ConfigError::Validation(
                "withdrawal.min_amount must be positive".to_string(),
            ));
        }
        if withdrawal.mobile_money_max < withdrawal.min_amount {
            return Err(ConfigError::Validation(
                "withdrawal.mobile_money_max is below withdrawal.min_amount".to_string(),
            ));
        }

        let payout = &config.payout;
        if payout.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "payout.timeout_secs must be positive".to_string(),
            ));
        }
        if payout.gateway == GatewayKind::Http
            && payout.endpoint.as_deref().map_or(true, |e| e.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "payout.endpoint is required for the http gateway".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ConfigLoader::new().into_config();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.escrow.auto_release_grace_hours, 24);
        assert_eq!(config.escrow.sweep_interval_secs, 3600);
        assert_eq!(config.withdrawal.currency, "KES");
        assert_eq!(config.withdrawal.min_amount, dec!(100));
        assert_eq!(config.withdrawal.mobile_money_max, dec!(150000));
        assert_eq!(config.payout.gateway, GatewayKind::Simulated);
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_load_string() {
        let config_str = r#"
[server]
listen = "0.0.0.0:9090"

[escrow]
commission_rate = "0.2"
sweep_interval_secs = 60

[withdrawal]
min_amount = 50

[payout]
gateway = "http"
endpoint = "https://payouts.example.test/b2c"
timeout_secs = 5
"#;

        let loader = ConfigLoader::load_str(config_str).unwrap();
        let config = loader.get();

        assert_eq!(config.server.listen.port(), 9090);
        assert_eq!(config.escrow.commission_rate, dec!(0.2));
        assert_eq!(config.escrow.sweep_interval_secs, 60);
        assert_eq!(config.escrow.auto_release_grace_hours, 24);
        assert_eq!(config.withdrawal.min_amount, dec!(50));
        assert_eq!(config.payout.gateway, GatewayKind::Http);
        assert_eq!(config.payout.timeout_secs, 5);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            "[payout]\ngateway = \"http\"",
            "[escrow]\ncommission_rate = \"1.0\"",
            "[escrow]\nsweep_interval_secs = 0",
            "[withdrawal]\ncurrency = \"KSH1\"",
            "[withdrawal]\nmin_amount = 500\nmobile_money_max = 100",
            "[database]\nmax_connections = 0",
        ];
        for case in cases {
            let result = ConfigLoader::load_str(case);
            assert!(
                matches!(result, Err(ConfigError::Validation(_))),
                "expected validation error for {:?}",
                case
            );
        }
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            ConfigLoader::load_str("[server\nlisten ="),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexvault.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[database]\nurl = \"sqlite:/tmp/x.db\"").unwrap();

        let loader = ConfigLoader::load_file(&path).unwrap();
        assert_eq!(loader.get().database.url, "sqlite:/tmp/x.db");
        assert_eq!(loader.path(), Some(path.as_path()));

        let missing = ConfigLoader::load_file(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DATABASE_URL, "sqlite::memory:"),
            (ENV_LISTEN, "127.0.0.1:3000"),
            (ENV_LOG, "debug,sqlx=warn"),
        ]
        .into_iter()
        .collect();

        let config = ConfigLoader::new()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap()
            .into_config();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.logging.level, "debug,sqlx=warn");

        let bad = ConfigLoader::new().with_overrides(|key| {
            (key == ENV_LISTEN).then(|| "not-an-address".to_string())
        });
        assert!(matches!(bad, Err(ConfigError::Validation(_))));
    }
}
