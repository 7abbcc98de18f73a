//! Configuration types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LexvaultConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub escrow: EscrowConfig,

    #[serde(default)]
    pub withdrawal: WithdrawalConfig,

    #[serde(default)]
    pub payout: PayoutConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL, e.g. `sqlite:data/lexvault.db`
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite:data/lexvault.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Escrow ledger and auto-release sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// Hours after the scheduled end before a payout is released automatically
    #[serde(default = "default_grace_hours")]
    pub auto_release_grace_hours: i64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_true")]
    pub sweep_enabled: bool,

    /// Platform share of the gross amount, used when seeding bookings
    #[serde(default = "default_commission_rate")]
    pub commission_rate: Decimal,
}

fn default_grace_hours() -> i64 {
    24
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_commission_rate() -> Decimal {
    Decimal::new(15, 2)
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            auto_release_grace_hours: default_grace_hours(),
            sweep_interval_secs: default_sweep_interval(),
            sweep_enabled: true,
            commission_rate: default_commission_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalConfig {
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default = "default_min_amount")]
    pub min_amount: Decimal,

    #[serde(default = "default_mobile_money_max")]
    pub mobile_money_max: Decimal,
}

fn default_currency() -> String {
    "KES".to_string()
}

fn default_min_amount() -> Decimal {
    Decimal::from(100)
}

fn default_mobile_money_max() -> Decimal {
    Decimal::from(150_000)
}

impl Default for WithdrawalConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            min_amount: default_min_amount(),
            mobile_money_max: default_mobile_money_max(),
        }
    }
}

/// Which payout gateway the dispatcher talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    #[default]
    Simulated,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutConfig {
    #[serde(default)]
    pub gateway: GatewayKind,

    /// Required for the http gateway
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Upper bound on one provider call
    #[serde(default = "default_payout_timeout")]
    pub timeout_secs: u64,
}

fn default_payout_timeout() -> u64 {
    30
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayKind::Simulated,
            endpoint: None,
            api_key: None,
            timeout_secs: default_payout_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
