//! Wallet queries, admin freeze and ledger reconciliation

use crate::error::{BusinessError, BusinessResult};
use crate::services::ServiceContext;
use crate::withdrawal::lock_wallet;
use chrono::Utc;
use lexvault_core::{ledger_balance, BalanceSnapshot, Wallet, WalletTransaction};
use lexvault_persistence::{WalletRepo, WalletTransactionRepo};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Balance view returned to a lawyer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowSummary {
    pub lawyer_id: String,
    pub currency: String,
    pub balance: Decimal,
    pub pending_balance: Decimal,
    pub available_balance: Decimal,
    pub is_active: bool,
    /// Holds not yet released or reversed
    pub pending_transactions: Vec<WalletTransaction>,
}

/// Stored balances compared with what the transaction log implies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub lawyer_id: String,
    pub wallet_id: String,
    pub stored: BalanceSnapshot,
    pub ledger_balance: Decimal,
    pub ledger_pending: Decimal,
    pub balance_drift: Decimal,
    pub pending_drift: Decimal,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.balance_drift.is_zero() && self.pending_drift.is_zero()
    }
}

pub struct WalletService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> WalletService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn get_wallet(&self, lawyer_id: &str) -> BusinessResult<Wallet> {
        let mut conn = self.ctx.pool().acquire().await?;
        WalletRepo::get_by_lawyer(&mut conn, lawyer_id)
            .await?
            .ok_or_else(|| BusinessError::not_found("Wallet", lawyer_id))
    }

    pub async fn get_escrow_summary(&self, lawyer_id: &str) -> BusinessResult<EscrowSummary> {
        let mut conn = self.ctx.pool().acquire().await?;
        let wallet = WalletRepo::get_by_lawyer(&mut conn, lawyer_id)
            .await?
            .ok_or_else(|| BusinessError::not_found("Wallet", lawyer_id))?;
        let pending_transactions = WalletTransactionRepo::list_open_holds(&mut conn, &wallet.id).await?;

        Ok(EscrowSummary {
            lawyer_id: wallet.lawyer_id,
            currency: wallet.currency,
            balance: wallet.balance,
            pending_balance: wallet.pending_balance,
            available_balance: wallet.available_balance,
            is_active: wallet.is_active,
            pending_transactions,
        })
    }

    pub async fn list_transactions(&self, lawyer_id: &str) -> BusinessResult<Vec<WalletTransaction>> {
        let wallet = self.get_wallet(lawyer_id).await?;
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(WalletTransactionRepo::list_by_wallet(&mut conn, &wallet.id).await?)
    }

    pub async fn list_wallets(&self) -> BusinessResult<Vec<Wallet>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(WalletRepo::list_all(&mut conn).await?)
    }

    /// Freezes or unfreezes a wallet. Balances are untouched.
    pub async fn set_wallet_active(&self, lawyer_id: &str, active: bool) -> BusinessResult<Wallet> {
        let mut tx = self.ctx.begin().await?;
        let mut wallet = lock_wallet(&mut tx, lawyer_id).await?;
        if wallet.is_active != active {
            wallet.is_active = active;
            wallet.updated_at = Utc::now();
            WalletRepo::save(&mut *tx, &wallet).await?;
        }
        tx.commit().await?;

        info!(lawyer_id, active, "wallet status set");
        Ok(wallet)
    }

    // === Reconciliation ===

    /// Recomputes `balance` from the log and `pending_balance` from open
    /// holds, and reports any drift from the stored row.
    pub async fn reconcile(&self, lawyer_id: &str) -> BusinessResult<ReconciliationReport> {
        let wallet = self.get_wallet(lawyer_id).await?;
        self.reconcile_wallet(&wallet).await
    }

    pub async fn reconcile_all(&self) -> BusinessResult<Vec<ReconciliationReport>> {
        let wallets = self.list_wallets().await?;
        let mut reports = Vec::with_capacity(wallets.len());
        for wallet in &wallets {
            reports.push(self.reconcile_wallet(wallet).await?);
        }
        Ok(reports)
    }

    async fn reconcile_wallet(&self, wallet: &Wallet) -> BusinessResult<ReconciliationReport> {
        let mut conn = self.ctx.pool().acquire().await?;
        let entries = WalletTransactionRepo::list_by_wallet(&mut conn, &wallet.id).await?;
        let holds = WalletTransactionRepo::list_open_holds(&mut conn, &wallet.id).await?;

        let computed_balance = ledger_balance(&entries);
        let computed_pending: Decimal = holds.iter().map(|t| t.amount).sum();

        let report = ReconciliationReport {
            lawyer_id: wallet.lawyer_id.clone(),
            wallet_id: wallet.id.clone(),
            stored: wallet.snapshot(),
            ledger_balance: computed_balance,
            ledger_pending: computed_pending,
            balance_drift: wallet.balance - computed_balance,
            pending_drift: wallet.pending_balance - computed_pending,
        };
        if !report.is_consistent() {
            warn!(
                lawyer_id = %wallet.lawyer_id,
                balance_drift = %report.balance_drift,
                pending_drift = %report.pending_drift,
                "wallet does not reconcile with its ledger"
            );
        }
        Ok(report)
    }
}
