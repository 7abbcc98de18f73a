//! Request handlers
//!
//! Thin adapters: resolve the caller, call one service operation, wrap the
//! result in [`ApiResponse`].

use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::extract::{Caller, Role};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use lexvault_business::{
    handle_payout_callback, BookingEvents, CallbackOutcome, CancellationRequested, EscrowService,
    EscrowSummary, HoldOutcome, PaymentConfirmed, PayoutCallback, ProcessDecision,
    ReconciliationReport, RefundOutcome, ReleaseOutcome, SettlementResult, SweepSnapshot,
    WalletService, WithdrawalService,
};
use lexvault_core::{
    Booking, BookingStatus, DestinationDetails, Wallet, WalletTransaction, WithdrawalMethod,
    WithdrawalRequest, WithdrawalStats, WithdrawalStatus,
};
use lexvault_persistence::ClientRefundRow;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: ErrorBody) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

type Reply<T> = ApiResult<Json<ApiResponse<T>>>;

fn reply<T>(data: T) -> Reply<T> {
    Ok(Json(ApiResponse::ok(data)))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

impl StatusQuery {
    fn parse(&self) -> ApiResult<Option<WithdrawalStatus>> {
        match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(s) => WithdrawalStatus::from_str(s)
                .map(Some)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{}'", s))),
        }
    }
}

// ============================================================================
// Lawyer wallet
// ============================================================================

pub async fn get_balance(State(state): State<AppState>, caller: Caller) -> Reply<EscrowSummary> {
    caller.require(Role::Lawyer)?;
    reply(WalletService::new(&state.ctx).get_escrow_summary(&caller.user_id).await?)
}

pub async fn list_transactions(
    State(state): State<AppState>,
    caller: Caller,
) -> Reply<Vec<WalletTransaction>> {
    caller.require(Role::Lawyer)?;
    reply(WalletService::new(&state.ctx).list_transactions(&caller.user_id).await?)
}

#[derive(Debug, Deserialize)]
pub struct WithdrawBody {
    pub amount: Decimal,
    pub method: String,
    #[serde(default)]
    pub destination: DestinationDetails,
}

pub async fn create_withdrawal(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<WithdrawBody>,
) -> ApiResult<(StatusCode, Json<ApiResponse<WithdrawalRequest>>)> {
    caller.require(Role::Lawyer)?;
    let method = WithdrawalMethod::from_str(&body.method)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown method '{}'", body.method)))?;
    let request = WithdrawalService::new(&state.ctx)
        .create_withdrawal_request(&caller.user_id, body.amount, method, &body.destination)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(request))))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<StatusQuery>,
) -> Reply<Vec<WithdrawalRequest>> {
    caller.require(Role::Lawyer)?;
    let status = query.parse()?;
    reply(
        WithdrawalService::new(&state.ctx)
            .list_withdrawals(&caller.user_id, status)
            .await?,
    )
}

pub async fn get_withdrawal(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Reply<WithdrawalRequest> {
    caller.require_any(&[Role::Lawyer, Role::Admin])?;
    let request = WithdrawalService::new(&state.ctx).get_withdrawal(&id).await?;
    if caller.role == Role::Lawyer && request.lawyer_id != caller.user_id {
        return Err(ApiError::Forbidden("withdrawal belongs to another lawyer".to_string()));
    }
    reply(request)
}

pub async fn cancel_withdrawal(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Reply<WithdrawalRequest> {
    caller.require(Role::Lawyer)?;
    reply(
        WithdrawalService::new(&state.ctx)
            .cancel_withdrawal_request(&id, &caller.user_id)
            .await?,
    )
}

pub async fn get_stats(State(state): State<AppState>, caller: Caller) -> Reply<WithdrawalStats> {
    caller.require(Role::Lawyer)?;
    reply(WithdrawalService::new(&state.ctx).get_stats(&caller.user_id).await?)
}

// ============================================================================
// Admin
// ============================================================================

pub async fn process_withdrawal(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(decision): Json<ProcessDecision>,
) -> Reply<WithdrawalRequest> {
    caller.require(Role::Admin)?;
    reply(
        WithdrawalService::new(&state.ctx)
            .process_withdrawal_request(&id, &caller.user_id, decision)
            .await?,
    )
}

#[derive(Debug, Deserialize)]
pub struct CompleteBody {
    pub provider_transaction_id: String,
}

pub async fn complete_withdrawal(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(body): Json<CompleteBody>,
) -> Reply<WithdrawalRequest> {
    caller.require(Role::Admin)?;
    let provider_transaction_id = body.provider_transaction_id.trim();
    if provider_transaction_id.is_empty() {
        return Err(ApiError::BadRequest("provider_transaction_id is required".to_string()));
    }
    reply(
        WithdrawalService::new(&state.ctx)
            .complete_withdrawal(&id, provider_transaction_id)
            .await?,
    )
}

#[derive(Debug, Deserialize)]
pub struct FailBody {
    pub reason: String,
}

pub async fn fail_withdrawal(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(body): Json<FailBody>,
) -> Reply<WithdrawalRequest> {
    caller.require(Role::Admin)?;
    reply(
        WithdrawalService::new(&state.ctx)
            .fail_withdrawal(&id, &body.reason)
            .await?,
    )
}

pub async fn admin_list_withdrawals(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<StatusQuery>,
) -> Reply<Vec<WithdrawalRequest>> {
    caller.require(Role::Admin)?;
    let status = query.parse()?;
    reply(WithdrawalService::new(&state.ctx).list_all_withdrawals(status).await?)
}

#[derive(Debug, Deserialize)]
pub struct ActiveBody {
    pub active: bool,
}

pub async fn set_wallet_active(
    State(state): State<AppState>,
    caller: Caller,
    Path(lawyer_id): Path<String>,
    Json(body): Json<ActiveBody>,
) -> Reply<Wallet> {
    caller.require(Role::Admin)?;
    reply(
        WalletService::new(&state.ctx)
            .set_wallet_active(&lawyer_id, body.active)
            .await?,
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct ReleaseBody {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn release_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(booking_id): Path<String>,
    body: Option<Json<ReleaseBody>>,
) -> Reply<ReleaseOutcome> {
    caller.require(Role::Admin)?;
    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or_else(|| format!("released by {}", caller.user_id));
    reply(
        EscrowService::new(&state.ctx)
            .release_payment(&booking_id, &reason)
            .await?,
    )
}

pub async fn list_client_refunds(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<StatusQuery>,
) -> Reply<Vec<ClientRefundRow>> {
    caller.require(Role::Admin)?;
    let status = query.status.as_deref().map(str::to_uppercase);
    reply(
        EscrowService::new(&state.ctx)
            .list_client_refunds(status.as_deref())
            .await?,
    )
}

pub async fn reconcile_wallet(
    State(state): State<AppState>,
    caller: Caller,
    Path(lawyer_id): Path<String>,
) -> Reply<ReconciliationReport> {
    caller.require(Role::Admin)?;
    reply(WalletService::new(&state.ctx).reconcile(&lawyer_id).await?)
}

// ============================================================================
// Booking signals
// ============================================================================

const SIGNAL_ROLES: &[Role] = &[Role::System, Role::Admin];

pub async fn payment_confirmed(
    State(state): State<AppState>,
    caller: Caller,
    Json(event): Json<PaymentConfirmed>,
) -> Reply<HoldOutcome> {
    caller.require_any(SIGNAL_ROLES)?;
    reply(BookingEvents::new(&state.ctx).on_payment_confirmed(&event).await?)
}

pub async fn session_completed(
    State(state): State<AppState>,
    caller: Caller,
    Path(booking_id): Path<String>,
) -> Reply<BookingStatus> {
    caller.require_any(SIGNAL_ROLES)?;
    reply(BookingEvents::new(&state.ctx).on_session_completed(&booking_id).await?)
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub reason: String,
    /// Defaults to the caller
    #[serde(default)]
    pub cancelled_by: Option<String>,
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(booking_id): Path<String>,
    Json(body): Json<CancelBody>,
) -> Reply<RefundOutcome> {
    caller.require_any(SIGNAL_ROLES)?;
    let event = CancellationRequested {
        booking_id,
        cancelled_by: body.cancelled_by.unwrap_or_else(|| caller.user_id.clone()),
        reason: body.reason,
    };
    reply(BookingEvents::new(&state.ctx).on_cancellation_requested(&event).await?)
}

pub async fn get_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(booking_id): Path<String>,
) -> Reply<Booking> {
    caller.require_any(SIGNAL_ROLES)?;
    reply(EscrowService::new(&state.ctx).get_booking(&booking_id).await?)
}

// ============================================================================
// Provider callbacks
// ============================================================================

pub async fn payout_callback(
    State(state): State<AppState>,
    Json(callback): Json<PayoutCallback>,
) -> Reply<CallbackOutcome> {
    reply(handle_payout_callback(&state.ctx, &callback).await?)
}

pub async fn settlement_callback(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    Json(result): Json<SettlementResult>,
) -> Reply<CallbackOutcome> {
    reply(
        BookingEvents::new(&state.ctx)
            .on_payment_settlement(&booking_id, &result)
            .await?,
    )
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: &'static str,
    pub gateway: &'static str,
    pub sweeper: SweepSnapshot,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    let db_up = sqlx::query("SELECT 1").execute(state.ctx.pool()).await.is_ok();
    let health = Health {
        status: if db_up { "healthy" } else { "unhealthy" },
        database: if db_up { "up" } else { "down" },
        gateway: state.ctx.gateway().name(),
        sweeper: state.sweep_metrics.snapshot(),
    };
    let status = if db_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}
