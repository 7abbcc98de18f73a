//! Service context shared by every business service
//!
//! Holds the connection pool, the ledger settings derived from config and
//! the payout gateway. Services borrow it: `EscrowService::new(&ctx)`.

use crate::error::BusinessResult;
use crate::payout::{gateway_from_config, PayoutGateway};
use chrono::Duration;
use lexvault_config::LexvaultConfig;
use lexvault_core::{Currency, WithdrawalLimits};
use rust_decimal::Decimal;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::sync::Arc;

/// Ledger rules that come from configuration
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub currency: String,
    pub limits: WithdrawalLimits,
    pub auto_release_grace: Duration,
    pub payout_timeout: std::time::Duration,
    pub commission_rate: Decimal,
}

impl LedgerSettings {
    pub fn from_config(config: &LexvaultConfig) -> Self {
        Self {
            currency: config.withdrawal.currency.to_uppercase(),
            limits: WithdrawalLimits {
                min_amount: config.withdrawal.min_amount,
                mobile_money_max: config.withdrawal.mobile_money_max,
            },
            auto_release_grace: Duration::hours(config.escrow.auto_release_grace_hours),
            payout_timeout: std::time::Duration::from_secs(config.payout.timeout_secs),
            commission_rate: config.escrow.commission_rate,
        }
    }

    pub fn currency(&self) -> Currency {
        Currency::from_code(&self.currency)
    }

    pub fn with_payout_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.payout_timeout = timeout;
        self
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self::from_config(&LexvaultConfig::default())
    }
}

/// Context for business operations - contains database access
pub struct ServiceContext {
    pool: SqlitePool,
    settings: LedgerSettings,
    gateway: Arc<dyn PayoutGateway>,
}

impl ServiceContext {
    pub fn new(pool: SqlitePool, settings: LedgerSettings, gateway: Arc<dyn PayoutGateway>) -> Self {
        Self {
            pool,
            settings,
            gateway,
        }
    }

    /// Builds settings and the payout gateway from configuration.
    pub fn from_config(pool: SqlitePool, config: &LexvaultConfig) -> BusinessResult<Self> {
        let gateway = gateway_from_config(&config.payout)
            .map_err(|e| crate::error::BusinessError::ExternalProvider(e.to_string()))?;
        Ok(Self::new(pool, LedgerSettings::from_config(config), gateway))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn gateway(&self) -> &dyn PayoutGateway {
        self.gateway.as_ref()
    }

    /// Starts a transaction. Dropping it without commit rolls back.
    pub async fn begin(&self) -> BusinessResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_settings_from_config() {
        let mut config = LexvaultConfig::default();
        config.withdrawal.currency = "kes".to_string();
        config.withdrawal.min_amount = dec!(250);
        config.escrow.auto_release_grace_hours = 48;
        config.payout.timeout_secs = 7;

        let settings = LedgerSettings::from_config(&config);
        assert_eq!(settings.currency, "KES");
        assert_eq!(settings.limits.min_amount, dec!(250));
        assert_eq!(settings.limits.mobile_money_max, dec!(150000));
        assert_eq!(settings.auto_release_grace, Duration::hours(48));
        assert_eq!(settings.payout_timeout, std::time::Duration::from_secs(7));
        assert_eq!(settings.currency().symbol, "KSh");
    }
}
