//! Withdrawal request lifecycle
//!
//! Every reservation of `available_balance` made by
//! [`WithdrawalService::create_withdrawal_request`] is resolved exactly once:
//! `complete_withdrawal` debits `balance`, every other terminal path
//! (reject, cancel, failure) gives the reservation back.

use crate::error::{BusinessError, BusinessResult};
use crate::payout::PayoutDispatcher;
use crate::services::ServiceContext;
use chrono::Utc;
use lexvault_core::{
    DestinationDetails, TransactionStatus, TransactionType, Wallet, WalletTransaction,
    WithdrawalMethod, WithdrawalRequest, WithdrawalStats, WithdrawalStatus,
};
use lexvault_persistence::{WalletRepo, WalletTransactionRepo, WithdrawalRepo};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{error, info, warn};

/// Admin decision on a PENDING request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDecision {
    pub approved: bool,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

pub struct WithdrawalService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> WithdrawalService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Validates and creates a PENDING request, reserving the amount.
    ///
    /// Checks run in order: amount limits, wallet (exists, active, funds),
    /// destination completeness, no other in-flight request.
    pub async fn create_withdrawal_request(
        &self,
        lawyer_id: &str,
        amount: Decimal,
        method: WithdrawalMethod,
        details: &DestinationDetails,
    ) -> BusinessResult<WithdrawalRequest> {
        self.ctx.settings().limits.check(amount, method)?;

        let now = Utc::now();
        let mut tx = self.ctx.begin().await?;
        let mut wallet = lock_wallet(&mut tx, lawyer_id).await?;
        wallet.ensure_active()?;
        if amount > wallet.available_balance {
            return Err(BusinessError::InsufficientFunds {
                requested: amount,
                available: wallet.available_balance,
            });
        }

        let destination = details.validate_for(method)?;

        if let Some(existing) = WithdrawalRepo::find_in_flight(&mut *tx, lawyer_id).await? {
            return Err(BusinessError::conflict(format!(
                "withdrawal {} is still {}",
                existing.id, existing.status
            )));
        }

        let request = WithdrawalRequest::new(lawyer_id, amount, destination, now);
        wallet.reserve(amount)?;
        wallet.updated_at = now;
        WalletRepo::save(&mut *tx, &wallet).await?;
        WithdrawalRepo::insert(&mut *tx, &request).await?;
        tx.commit().await?;

        info!(
            request_id = %request.id,
            lawyer_id,
            amount = %amount,
            method = %method,
            available_balance = %wallet.available_balance,
            "withdrawal requested"
        );
        Ok(request)
    }

    /// Approves or rejects a PENDING request. Approval hands the request to
    /// the payout dispatcher and returns its resulting state.
    pub async fn process_withdrawal_request(
        &self,
        request_id: &str,
        processed_by: &str,
        decision: ProcessDecision,
    ) -> BusinessResult<WithdrawalRequest> {
        let now = Utc::now();
        let mut tx = self.ctx.begin().await?;
        let mut request = lock_request(&mut tx, request_id).await?;
        if request.status != WithdrawalStatus::Pending {
            return Err(BusinessError::conflict(format!(
                "withdrawal {} is {}, only PENDING requests can be processed",
                request_id, request.status
            )));
        }
        let mut wallet = lock_wallet(&mut tx, &request.lawyer_id).await?;

        if !decision.approved {
            let reason = decision
                .rejection_reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty());
            request.reject(processed_by, reason, now)?;
            wallet.restore(request.amount)?;
            wallet.updated_at = now;
            WalletRepo::save(&mut *tx, &wallet).await?;
            WithdrawalRepo::save(&mut *tx, &request).await?;
            tx.commit().await?;
            info!(request_id, processed_by, amount = %request.amount, "withdrawal rejected, funds restored");
            return Ok(request);
        }

        wallet.ensure_active()?;
        request.approve(processed_by, now)?;
        WithdrawalRepo::save(&mut *tx, &request).await?;
        tx.commit().await?;
        info!(request_id, processed_by, amount = %request.amount, "withdrawal approved");

        match PayoutDispatcher::new(self.ctx)
            .initiate_withdrawal_payout(request_id)
            .await
        {
            Ok(request) => Ok(request),
            Err(dispatch_error) => self.fail_stranded_approval(request_id, dispatch_error).await,
        }
    }

    /// A dispatch that errors before PROCESSING commits leaves the request
    /// APPROVED with its reservation held. Fail it so the funds come back.
    /// Anything past APPROVED keeps the dispatcher's error.
    async fn fail_stranded_approval(
        &self,
        request_id: &str,
        dispatch_error: BusinessError,
    ) -> BusinessResult<WithdrawalRequest> {
        let current = match self.get_withdrawal(request_id).await {
            Ok(current) => current,
            Err(e) => {
                error!(request_id, error = %e, dispatch_error = %dispatch_error, "cannot read withdrawal after dispatch error");
                return Err(dispatch_error);
            }
        };
        if current.status != WithdrawalStatus::Approved {
            return Err(dispatch_error);
        }

        let reason = format!("dispatch failed: {}", dispatch_error);
        match self.handle_withdrawal_failure(request_id, &reason).await {
            Ok(failed) => Ok(failed),
            Err(e) => {
                error!(
                    request_id,
                    error = %e,
                    dispatch_error = %dispatch_error,
                    "approved withdrawal still holds its reservation; fail it from the admin queue"
                );
                Err(dispatch_error)
            }
        }
    }

    /// PROCESSING -> COMPLETED: debits `balance` and appends the
    /// WITHDRAWAL entry.
    pub async fn complete_withdrawal(
        &self,
        request_id: &str,
        provider_transaction_id: &str,
    ) -> BusinessResult<WithdrawalRequest> {
        let now = Utc::now();
        let mut tx = self.ctx.begin().await?;
        let mut request = lock_request(&mut tx, request_id).await?;
        if request.status != WithdrawalStatus::Processing {
            return Err(BusinessError::conflict(format!(
                "withdrawal {} is {}, only PROCESSING requests can be completed",
                request_id, request.status
            )));
        }
        let mut wallet = lock_wallet(&mut tx, &request.lawyer_id).await?;

        request.complete(provider_transaction_id, now)?;
        let balance_before = wallet.balance;
        wallet.settle_withdrawal(request.amount)?;
        wallet.updated_at = now;

        let entry = WalletTransaction::new(
            &wallet.id,
            TransactionType::Withdrawal,
            TransactionStatus::Completed,
            -request.amount,
            balance_before,
            wallet.balance,
            now,
        )
        .with_description(format!("Withdrawal to {}", request.destination.label()))
        .with_metadata(serde_json::json!({
            "withdrawal_id": request.id,
            "method": request.method.as_str(),
            "provider_transaction_id": request.provider_transaction_id,
        }));

        WalletRepo::save(&mut *tx, &wallet).await?;
        WithdrawalRepo::save(&mut *tx, &request).await?;
        WalletTransactionRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;

        info!(
            request_id,
            lawyer_id = %request.lawyer_id,
            amount = %request.amount,
            provider_transaction_id,
            balance = %wallet.balance,
            "withdrawal completed"
        );
        Ok(request)
    }

    /// APPROVED/PROCESSING -> FAILED with the reservation restored.
    /// A request that is already terminal is returned unchanged.
    pub async fn handle_withdrawal_failure(
        &self,
        request_id: &str,
        error_message: &str,
    ) -> BusinessResult<WithdrawalRequest> {
        let now = Utc::now();
        let mut tx = self.ctx.begin().await?;
        let mut request = lock_request(&mut tx, request_id).await?;
        if request.status.is_terminal() {
            warn!(request_id, status = %request.status, error_message, "failure reported for a closed withdrawal");
            return Ok(request);
        }

        request.fail(error_message, now)?;
        let mut wallet = lock_wallet(&mut tx, &request.lawyer_id).await?;
        wallet.restore(request.amount)?;
        wallet.updated_at = now;
        WalletRepo::save(&mut *tx, &wallet).await?;
        WithdrawalRepo::save(&mut *tx, &request).await?;
        tx.commit().await?;

        warn!(
            request_id,
            lawyer_id = %request.lawyer_id,
            amount = %request.amount,
            error_message,
            "withdrawal failed, funds restored"
        );
        Ok(request)
    }

    /// Operator marks an APPROVED or PROCESSING payout as failed, e.g. a
    /// bounced bank transfer or an approval whose dispatch never ran.
    pub async fn fail_withdrawal(&self, request_id: &str, reason: &str) -> BusinessResult<WithdrawalRequest> {
        if reason.trim().is_empty() {
            return Err(BusinessError::validation("reason", "is required"));
        }
        let current = self.get_withdrawal(request_id).await?;
        if !matches!(
            current.status,
            WithdrawalStatus::Approved | WithdrawalStatus::Processing
        ) {
            return Err(BusinessError::conflict(format!(
                "withdrawal {} is {}, only APPROVED or PROCESSING requests can be failed",
                request_id, current.status
            )));
        }
        self.handle_withdrawal_failure(request_id, reason.trim()).await
    }

    /// PENDING -> CANCELLED by the owning lawyer, reservation restored.
    pub async fn cancel_withdrawal_request(
        &self,
        request_id: &str,
        lawyer_id: &str,
    ) -> BusinessResult<WithdrawalRequest> {
        let now = Utc::now();
        let mut tx = self.ctx.begin().await?;
        let mut request = lock_request(&mut tx, request_id).await?;
        if request.lawyer_id != lawyer_id {
            return Err(BusinessError::Forbidden(format!(
                "withdrawal {} belongs to another lawyer",
                request_id
            )));
        }
        if request.status != WithdrawalStatus::Pending {
            return Err(BusinessError::conflict(format!(
                "withdrawal {} is {}, only PENDING requests can be cancelled",
                request_id, request.status
            )));
        }

        request.cancel(now)?;
        let mut wallet = lock_wallet(&mut tx, lawyer_id).await?;
        wallet.restore(request.amount)?;
        wallet.updated_at = now;
        WalletRepo::save(&mut *tx, &wallet).await?;
        WithdrawalRepo::save(&mut *tx, &request).await?;
        tx.commit().await?;

        info!(request_id, lawyer_id, amount = %request.amount, "withdrawal cancelled, funds restored");
        Ok(request)
    }

    // === Queries ===

    pub async fn get_withdrawal(&self, request_id: &str) -> BusinessResult<WithdrawalRequest> {
        let mut conn = self.ctx.pool().acquire().await?;
        WithdrawalRepo::get_by_id(&mut conn, request_id)
            .await?
            .ok_or_else(|| BusinessError::not_found("WithdrawalRequest", request_id))
    }

    pub async fn list_withdrawals(
        &self,
        lawyer_id: &str,
        status: Option<WithdrawalStatus>,
    ) -> BusinessResult<Vec<WithdrawalRequest>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(WithdrawalRepo::list_by_lawyer(&mut conn, lawyer_id, status).await?)
    }

    /// Every lawyer's requests, oldest first. For the admin queue.
    pub async fn list_all_withdrawals(
        &self,
        status: Option<WithdrawalStatus>,
    ) -> BusinessResult<Vec<WithdrawalRequest>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(WithdrawalRepo::list_all(&mut conn, status).await?)
    }

    pub async fn get_stats(&self, lawyer_id: &str) -> BusinessResult<WithdrawalStats> {
        let requests = self.list_withdrawals(lawyer_id, None).await?;
        Ok(WithdrawalStats::from_requests(&requests))
    }
}

async fn lock_request(conn: &mut SqliteConnection, request_id: &str) -> BusinessResult<WithdrawalRequest> {
    WithdrawalRepo::lock(conn, request_id)
        .await?
        .ok_or_else(|| BusinessError::not_found("WithdrawalRequest", request_id))
}

pub(crate) async fn lock_wallet(conn: &mut SqliteConnection, lawyer_id: &str) -> BusinessResult<Wallet> {
    WalletRepo::lock_by_lawyer(conn, lawyer_id)
        .await?
        .ok_or_else(|| BusinessError::not_found("Wallet", lawyer_id))
}
