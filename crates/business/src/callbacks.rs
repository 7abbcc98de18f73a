//! Payout provider callbacks
//!
//! Providers deliver results at least once, possibly out of order with our
//! own synchronous handling. A callback only ever moves a PROCESSING request;
//! everything else is classified and logged.

use crate::error::{BusinessError, BusinessResult};
use crate::services::ServiceContext;
use crate::withdrawal::WithdrawalService;
use lexvault_core::WithdrawalStatus;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Normalized outbound payout result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutCallback {
    pub request_id: String,
    pub success: bool,
    #[serde(default)]
    pub provider_transaction_id: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackOutcome {
    /// State changed
    Applied,
    /// Same result already recorded
    Duplicate,
    /// Nothing to do; logged for operators
    Ignored,
}

pub async fn handle_payout_callback(
    ctx: &ServiceContext,
    callback: &PayoutCallback,
) -> BusinessResult<CallbackOutcome> {
    let service = WithdrawalService::new(ctx);
    let request = service.get_withdrawal(&callback.request_id).await?;
    let provider_id = callback
        .provider_transaction_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    match request.status {
        WithdrawalStatus::Processing => {}
        WithdrawalStatus::Completed
            if callback.success
                && provider_id.is_some()
                && request.provider_transaction_id.as_deref() == provider_id =>
        {
            info!(request_id = %request.id, "duplicate payout callback");
            return Ok(CallbackOutcome::Duplicate);
        }
        status => {
            error!(
                request_id = %request.id,
                status = %status,
                success = callback.success,
                provider_transaction_id = ?provider_id,
                "payout callback for a request that is not PROCESSING, needs reconciliation"
            );
            return Ok(CallbackOutcome::Ignored);
        }
    }

    if callback.success {
        let provider_id = provider_id.ok_or_else(|| {
            BusinessError::validation("provider_transaction_id", "is required on success")
        })?;
        match service.complete_withdrawal(&request.id, provider_id).await {
            Ok(_) => Ok(CallbackOutcome::Applied),
            Err(e) if e.is_state_conflict() => {
                // Lost a race with the synchronous path.
                let current = service.get_withdrawal(&request.id).await?;
                if current.status == WithdrawalStatus::Completed
                    && current.provider_transaction_id.as_deref() == Some(provider_id)
                {
                    Ok(CallbackOutcome::Duplicate)
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    } else {
        let reason = callback
            .failure_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("provider reported failure");
        let updated = service.handle_withdrawal_failure(&request.id, reason).await?;
        if updated.status == WithdrawalStatus::Failed {
            Ok(CallbackOutcome::Applied)
        } else {
            Ok(CallbackOutcome::Ignored)
        }
    }
}
