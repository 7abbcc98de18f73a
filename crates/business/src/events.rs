//! Booking signals from the marketplace and the payment provider
//!
//! Each handler maps one inbound signal onto ledger operations and is safe
//! to call again with the same signal.

use crate::callbacks::CallbackOutcome;
use crate::error::{BusinessError, BusinessResult};
use crate::escrow::{hold_in, lock_booking, EscrowService, HoldOutcome, RefundOutcome};
use crate::services::ServiceContext;
use chrono::Utc;
use lexvault_core::{BookingStatus, ClientPaymentStatus, CommissionSplit};
use lexvault_persistence::BookingRepo;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// "client payment confirmed"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfirmed {
    pub booking_id: String,
    pub lawyer_id: String,
    pub gross_amount: Decimal,
    pub commission: Decimal,
    pub lawyer_payout: Decimal,
    #[serde(default)]
    pub payment_reference: Option<String>,
}

/// Normalized inbound settlement from the payment provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub success: bool,
    #[serde(default)]
    pub provider_transaction_id: Option<String>,
    #[serde(default)]
    pub amount_charged: Option<Decimal>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// "cancellation requested"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRequested {
    pub booking_id: String,
    pub cancelled_by: String,
    pub reason: String,
}

pub struct BookingEvents<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> BookingEvents<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Marks the client payment COMPLETED and escrows the lawyer payout in
    /// one transaction.
    pub async fn on_payment_confirmed(&self, event: &PaymentConfirmed) -> BusinessResult<HoldOutcome> {
        let split = CommissionSplit::verify(event.gross_amount, event.commission, event.lawyer_payout)?;

        let now = Utc::now();
        let mut tx = self.ctx.begin().await?;
        let mut booking = lock_booking(&mut tx, &event.booking_id).await?;

        if booking.lawyer_id != event.lawyer_id {
            return Err(BusinessError::validation(
                "lawyer_id",
                format!("booking {} belongs to another lawyer", booking.id),
            ));
        }
        if booking.split() != split {
            return Err(BusinessError::validation(
                "lawyer_payout",
                format!(
                    "amounts do not match booking {} (gross {}, payout {})",
                    booking.id, booking.gross_amount, booking.lawyer_payout
                ),
            ));
        }
        match booking.client_payment_status {
            ClientPaymentStatus::Completed => {
                info!(booking_id = %booking.id, "payment confirmation already applied");
                return Ok(HoldOutcome::AlreadyHeld);
            }
            ClientPaymentStatus::Refunded => {
                return Err(BusinessError::conflict(format!(
                    "booking {} was refunded",
                    booking.id
                )))
            }
            ClientPaymentStatus::Pending | ClientPaymentStatus::Failed => {}
        }
        if booking.status.is_closed() {
            return Err(BusinessError::conflict(format!(
                "booking {} is {}",
                booking.id, booking.status
            )));
        }

        booking.client_payment_status = ClientPaymentStatus::Completed;
        if event.payment_reference.is_some() {
            booking.payment_reference = event.payment_reference.clone();
        }
        booking.updated_at = now;
        BookingRepo::save(&mut *tx, &booking).await?;

        let outcome = hold_in(
            &mut tx,
            self.ctx.settings(),
            &booking.id,
            booking.lawyer_payout,
            &booking.lawyer_id,
            now,
        )
        .await?;
        tx.commit().await?;

        info!(booking_id = %booking.id, gross = %booking.gross_amount, "client payment confirmed");
        Ok(outcome)
    }

    /// Provider settlement callback for a client payment.
    pub async fn on_payment_settlement(
        &self,
        booking_id: &str,
        result: &SettlementResult,
    ) -> BusinessResult<CallbackOutcome> {
        let booking = EscrowService::new(self.ctx).get_booking(booking_id).await?;

        if !result.success {
            let mut tx = self.ctx.begin().await?;
            let mut booking = lock_booking(&mut tx, booking_id).await?;
            if booking.client_payment_status != ClientPaymentStatus::Pending {
                warn!(
                    booking_id,
                    status = booking.client_payment_status.as_str(),
                    reason = ?result.failure_reason,
                    "payment failure reported for a settled booking"
                );
                return Ok(CallbackOutcome::Ignored);
            }
            booking.client_payment_status = ClientPaymentStatus::Failed;
            booking.updated_at = Utc::now();
            BookingRepo::save(&mut *tx, &booking).await?;
            tx.commit().await?;
            warn!(booking_id, reason = ?result.failure_reason, "client payment failed");
            return Ok(CallbackOutcome::Applied);
        }

        let charged = result
            .amount_charged
            .ok_or_else(|| BusinessError::validation("amount_charged", "is required on success"))?;
        if charged != booking.gross_amount {
            return Err(BusinessError::validation(
                "amount_charged",
                format!("charged {} but booking gross is {}", charged, booking.gross_amount),
            ));
        }

        let confirmed = PaymentConfirmed {
            booking_id: booking.id.clone(),
            lawyer_id: booking.lawyer_id.clone(),
            gross_amount: booking.gross_amount,
            commission: booking.platform_commission,
            lawyer_payout: booking.lawyer_payout,
            payment_reference: result.provider_transaction_id.clone(),
        };
        match self.on_payment_confirmed(&confirmed).await? {
            HoldOutcome::Held => Ok(CallbackOutcome::Applied),
            HoldOutcome::AlreadyHeld => Ok(CallbackOutcome::Duplicate),
        }
    }

    /// The consultation took place. The payout stays escrowed until a
    /// release or the sweep.
    pub async fn on_session_completed(&self, booking_id: &str) -> BusinessResult<BookingStatus> {
        let mut tx = self.ctx.begin().await?;
        let mut booking = lock_booking(&mut tx, booking_id).await?;
        match booking.status {
            BookingStatus::Completed => return Ok(booking.status),
            status if status.is_closed() => {
                return Err(BusinessError::conflict(format!(
                    "booking {} is {}",
                    booking_id, status
                )))
            }
            _ => {}
        }
        booking.status = BookingStatus::Completed;
        booking.updated_at = Utc::now();
        BookingRepo::save(&mut *tx, &booking).await?;
        tx.commit().await?;

        info!(booking_id, "session completed");
        Ok(booking.status)
    }

    pub async fn on_cancellation_requested(&self, event: &CancellationRequested) -> BusinessResult<RefundOutcome> {
        if event.reason.trim().is_empty() {
            return Err(BusinessError::validation("reason", "is required"));
        }
        EscrowService::new(self.ctx)
            .refund_payment(&event.booking_id, event.reason.trim(), &event.cancelled_by)
            .await
    }
}
