//! Payout dispatch
//!
//! The boundary where an approved withdrawal meets an external provider.
//! Mobile money goes through a [`PayoutGateway`] under a bounded timeout;
//! bank transfers stay PROCESSING until an operator settles them by hand.
//! Every provider outcome ends in exactly one of `complete_withdrawal` or
//! `handle_withdrawal_failure`.

use crate::error::{BusinessError, BusinessResult};
use crate::services::ServiceContext;
use crate::withdrawal::WithdrawalService;
use async_trait::async_trait;
use chrono::Utc;
use lexvault_config::{GatewayKind, PayoutConfig};
use lexvault_core::{PayoutDestination, WithdrawalRequest, WithdrawalStatus};
use lexvault_persistence::{WalletRepo, WithdrawalRepo};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

// ============================================================================
// Gateway contract
// ============================================================================

/// Normalized outbound payout request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutInstruction {
    /// Withdrawal request id, used by the provider as idempotency key
    pub request_id: String,
    pub lawyer_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub phone_number: String,
    pub account_name: String,
}

/// Normalized provider answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutResult {
    pub success: bool,
    #[serde(default)]
    pub provider_transaction_id: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl PayoutResult {
    pub fn succeeded(provider_transaction_id: &str) -> Self {
        Self {
            success: true,
            provider_transaction_id: Some(provider_transaction_id.to_string()),
            failure_reason: None,
        }
    }

    pub fn failed(reason: &str) -> Self {
        Self {
            success: false,
            provider_transaction_id: None,
            failure_reason: Some(reason.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payout provider timed out after {0:?}")]
    Timeout(Duration),

    /// The provider answered and declined (insufficient float, bad number, ...)
    #[error("payout rejected by provider: {0}")]
    Rejected(String),

    #[error("payout transport error: {0}")]
    Transport(String),

    #[error("invalid payout provider response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait PayoutGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send_mobile_money(
        &self,
        instruction: &PayoutInstruction,
    ) -> Result<PayoutResult, GatewayError>;
}

// ============================================================================
// Simulated gateway
// ============================================================================

/// Behaviour of the [`SimulatedGateway`]
#[derive(Debug, Clone, PartialEq)]
pub enum SimulatedMode {
    Succeed,
    Reject(String),
    TransportError(String),
    /// Success without a provider transaction id
    Malformed,
    /// Never answers; only the dispatcher timeout ends the call
    Hang,
}

/// In-process gateway for development and tests. Records every instruction.
pub struct SimulatedGateway {
    mode: Mutex<SimulatedMode>,
    sent: Mutex<Vec<PayoutInstruction>>,
}

impl SimulatedGateway {
    pub fn new(mode: SimulatedMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(SimulatedMode::Succeed)
    }

    pub fn set_mode(&self, mode: SimulatedMode) {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    pub fn sent(&self) -> Vec<PayoutInstruction> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::succeeding()
    }
}

#[async_trait]
impl PayoutGateway for SimulatedGateway {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn send_mobile_money(
        &self,
        instruction: &PayoutInstruction,
    ) -> Result<PayoutResult, GatewayError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(instruction.clone());
        let mode = self
            .mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match mode {
            SimulatedMode::Succeed => {
                let id = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
                Ok(PayoutResult::succeeded(&format!("SIM{}", &id[..10])))
            }
            SimulatedMode::Reject(reason) => Ok(PayoutResult::failed(&reason)),
            SimulatedMode::TransportError(message) => Err(GatewayError::Transport(message)),
            SimulatedMode::Malformed => Ok(PayoutResult {
                success: true,
                provider_transaction_id: None,
                failure_reason: None,
            }),
            SimulatedMode::Hang => {
                std::future::pending::<()>().await;
                Err(GatewayError::Transport("unreachable".to_string()))
            }
        }
    }
}

// ============================================================================
// HTTP gateway
// ============================================================================

/// Posts the instruction as JSON and expects a [`PayoutResult`] back.
pub struct HttpPayoutGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpPayoutGateway {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
            timeout,
        })
    }
}

#[async_trait]
impl PayoutGateway for HttpPayoutGateway {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send_mobile_money(
        &self,
        instruction: &PayoutInstruction,
    ) -> Result<PayoutResult, GatewayError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Idempotency-Key", &instruction.request_id)
            .json(instruction);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(self.timeout)
            } else {
                GatewayError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("{}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(GatewayError::Transport(format!("provider returned {}", status)));
        }

        response
            .json::<PayoutResult>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

/// Builds the gateway selected in `[payout]`.
pub fn gateway_from_config(config: &PayoutConfig) -> Result<Arc<dyn PayoutGateway>, GatewayError> {
    match config.gateway {
        GatewayKind::Simulated => Ok(Arc::new(SimulatedGateway::succeeding())),
        GatewayKind::Http => {
            let endpoint = config
                .endpoint
                .as_deref()
                .ok_or_else(|| GatewayError::Transport("payout.endpoint is not set".to_string()))?;
            Ok(Arc::new(HttpPayoutGateway::new(
                endpoint,
                config.api_key.clone(),
                Duration::from_secs(config.timeout_secs),
            )?))
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

pub struct PayoutDispatcher<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> PayoutDispatcher<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Moves an APPROVED request to PROCESSING and dispatches it.
    ///
    /// Returns the request in its resulting state: COMPLETED or FAILED for
    /// mobile money, PROCESSING for bank transfers.
    pub async fn initiate_withdrawal_payout(&self, request_id: &str) -> BusinessResult<WithdrawalRequest> {
        let now = Utc::now();
        let mut tx = self.ctx.begin().await?;
        let mut request = WithdrawalRepo::lock(&mut *tx, request_id)
            .await?
            .ok_or_else(|| BusinessError::not_found("WithdrawalRequest", request_id))?;
        if request.status != WithdrawalStatus::Approved {
            return Err(BusinessError::conflict(format!(
                "withdrawal {} is {}, expected APPROVED",
                request_id, request.status
            )));
        }

        let wallet_active = WalletRepo::get_by_lawyer(&mut *tx, &request.lawyer_id)
            .await?
            .map(|w| w.is_active)
            .unwrap_or(false);
        if !wallet_active {
            drop(tx);
            warn!(request_id, lawyer_id = %request.lawyer_id, "wallet unavailable at dispatch");
            return WithdrawalService::new(self.ctx)
                .handle_withdrawal_failure(request_id, "wallet frozen before dispatch")
                .await;
        }

        request.mark_processing(now)?;
        WithdrawalRepo::save(&mut *tx, &request).await?;
        tx.commit().await?;
        info!(
            request_id,
            lawyer_id = %request.lawyer_id,
            amount = %request.amount,
            method = %request.method,
            "withdrawal dispatched"
        );

        let instruction = match &request.destination {
            PayoutDestination::BankTransfer { .. } => None,
            PayoutDestination::MobileMoney {
                phone_number,
                account_name,
            } => Some(PayoutInstruction {
                request_id: request.id.clone(),
                lawyer_id: request.lawyer_id.clone(),
                amount: request.amount,
                currency: self.ctx.settings().currency.clone(),
                phone_number: phone_number.clone(),
                account_name: account_name.clone(),
            }),
        };

        match instruction {
            Some(instruction) => self.send_and_settle(&instruction).await,
            None => {
                info!(
                    request_id,
                    destination = %request.destination.label(),
                    "bank transfer queued for manual settlement"
                );
                Ok(request)
            }
        }
    }

    async fn send_and_settle(&self, instruction: &PayoutInstruction) -> BusinessResult<WithdrawalRequest> {
        let withdrawals = WithdrawalService::new(self.ctx);
        match self.send(instruction).await {
            Ok(provider_transaction_id) => {
                match withdrawals
                    .complete_withdrawal(&instruction.request_id, &provider_transaction_id)
                    .await
                {
                    Ok(request) => Ok(request),
                    // a provider callback may have settled it first
                    Err(e) if e.is_state_conflict() => {
                        let current = withdrawals.get_withdrawal(&instruction.request_id).await?;
                        if current.status == WithdrawalStatus::Completed {
                            Ok(current)
                        } else {
                            error!(
                                request_id = %instruction.request_id,
                                provider_transaction_id = %provider_transaction_id,
                                status = %current.status,
                                "provider paid out but the request could not be completed; manual reconciliation required"
                            );
                            Err(e)
                        }
                    }
                    Err(e) => {
                        error!(
                            request_id = %instruction.request_id,
                            provider_transaction_id = %provider_transaction_id,
                            error = %e,
                            "provider paid out but completion failed; manual reconciliation required"
                        );
                        Err(e)
                    }
                }
            }
            Err(gateway_error) => {
                error!(
                    request_id = %instruction.request_id,
                    gateway = self.ctx.gateway().name(),
                    error = %gateway_error,
                    "mobile money payout failed"
                );
                withdrawals
                    .handle_withdrawal_failure(&instruction.request_id, &gateway_error.to_string())
                    .await
            }
        }
    }

    /// One provider call under the configured timeout. Returns the provider
    /// transaction id on success.
    async fn send(&self, instruction: &PayoutInstruction) -> Result<String, GatewayError> {
        let timeout = self.ctx.settings().payout_timeout;
        let result = tokio::time::timeout(timeout, self.ctx.gateway().send_mobile_money(instruction))
            .await
            .map_err(|_| GatewayError::Timeout(timeout))??;

        if !result.success {
            return Err(GatewayError::Rejected(
                result
                    .failure_reason
                    .unwrap_or_else(|| "provider declined the payout".to_string()),
            ));
        }
        result
            .provider_transaction_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                GatewayError::InvalidResponse("success without a provider transaction id".to_string())
            })
    }
}
