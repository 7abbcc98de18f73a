//! Escrow ledger - hold, release, auto-release sweep and refund
//!
//! A hold raises `pending_balance` and appends a PENDING payout entry. The
//! hold is later superseded by exactly one COMPLETED entry: a release
//! (payout) or a reversal (refund).

use crate::error::{BusinessError, BusinessResult};
use crate::services::{LedgerSettings, ServiceContext};
use crate::withdrawal::lock_wallet;
use chrono::{DateTime, Utc};
use lexvault_core::{
    ensure_money_amount, hours_until, Booking, BookingStatus, ClientPaymentStatus, PayoutStatus,
    RefundPolicy, TransactionStatus, TransactionType, WalletTransaction,
};
use lexvault_persistence::{
    BookingRepo, ClientRefundRepo, ClientRefundRow, WalletRepo, WalletTransactionRepo,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldOutcome {
    Held,
    AlreadyHeld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseOutcome {
    Released { amount: Decimal },
    AlreadyReleased,
}

/// What a refund did to the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundOutcome {
    pub booking_id: String,
    pub policy: RefundPolicy,
    pub refund_percent: Decimal,
    /// Amount queued back to the client
    pub client_refund_amount: Decimal,
    /// Escrow removed from the lawyer's pending balance
    pub reversed_hold: Decimal,
}

/// Result of one auto-release pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub examined: usize,
    pub released: usize,
    pub skipped: usize,
    pub failures: Vec<SweepFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub booking_id: String,
    pub error: String,
}

pub struct EscrowService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> EscrowService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    // === Hold ===

    /// Escrows a lawyer payout for a booking. Idempotent per booking.
    pub async fn hold_payment(
        &self,
        booking_id: &str,
        lawyer_payout: Decimal,
        lawyer_id: &str,
    ) -> BusinessResult<HoldOutcome> {
        let mut tx = self.ctx.begin().await?;
        let outcome = hold_in(
            &mut tx,
            self.ctx.settings(),
            booking_id,
            lawyer_payout,
            lawyer_id,
            Utc::now(),
        )
        .await?;
        tx.commit().await?;
        Ok(outcome)
    }

    // === Release ===

    pub async fn release_payment(&self, booking_id: &str, reason: &str) -> BusinessResult<ReleaseOutcome> {
        self.release_payment_at(booking_id, reason, Utc::now()).await
    }

    /// Moves a booking's escrow into the lawyer's earned balance.
    /// Releasing an already released booking is a no-op.
    pub async fn release_payment_at(
        &self,
        booking_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> BusinessResult<ReleaseOutcome> {
        let mut tx = self.ctx.begin().await?;
        let mut booking = lock_booking(&mut tx, booking_id).await?;

        match booking.payout_status {
            PayoutStatus::Completed => return Ok(ReleaseOutcome::AlreadyReleased),
            PayoutStatus::Failed => {
                return Err(BusinessError::conflict(format!(
                    "booking {} was refunded, its payout cannot be released",
                    booking_id
                )))
            }
            PayoutStatus::Pending => {}
        }
        if booking.client_payment_status != ClientPaymentStatus::Completed {
            return Err(BusinessError::conflict(format!(
                "booking {} client payment is {}, expected COMPLETED",
                booking_id,
                booking.client_payment_status.as_str()
            )));
        }

        let mut wallet = lock_wallet(&mut tx, &booking.lawyer_id).await?;
        wallet.ensure_active()?;
        require_open_hold(&mut tx, booking_id).await?;

        let amount = booking.lawyer_payout;
        let balance_before = wallet.balance;
        wallet.release(amount)?;
        wallet.updated_at = now;

        let entry = WalletTransaction::new(
            &wallet.id,
            TransactionType::Payout,
            TransactionStatus::Completed,
            amount,
            balance_before,
            wallet.balance,
            now,
        )
        .with_booking(booking_id)
        .with_description(format!("Escrow released: {}", reason))
        .with_metadata(serde_json::json!({ "reason": reason }));

        booking.payout_status = PayoutStatus::Completed;
        booking.payout_settled_at = Some(now);
        booking.updated_at = now;

        WalletRepo::save(&mut *tx, &wallet).await?;
        WalletTransactionRepo::insert(&mut *tx, &entry).await?;
        BookingRepo::save(&mut *tx, &booking).await?;
        tx.commit().await?;

        info!(
            booking_id,
            lawyer_id = %booking.lawyer_id,
            amount = %amount,
            reason,
            balance = %wallet.balance,
            "escrow released"
        );
        Ok(ReleaseOutcome::Released { amount })
    }

    // === Auto-release sweep ===

    pub async fn auto_release_expired_bookings(&self) -> BusinessResult<SweepReport> {
        self.auto_release_expired_bookings_at(Utc::now()).await
    }

    /// Releases every completed, paid booking whose session ended at least
    /// the grace period ago. One booking failing does not stop the pass.
    pub async fn auto_release_expired_bookings_at(&self, now: DateTime<Utc>) -> BusinessResult<SweepReport> {
        let cutoff = now - self.ctx.settings().auto_release_grace;
        let due = {
            let mut conn = self.ctx.pool().acquire().await?;
            BookingRepo::list_due_for_release(&mut conn, cutoff).await?
        };

        let mut report = SweepReport {
            examined: due.len(),
            ..SweepReport::default()
        };
        for booking_id in due {
            match self.release_payment_at(&booking_id, "auto-release", now).await {
                Ok(ReleaseOutcome::Released { .. }) => report.released += 1,
                Ok(ReleaseOutcome::AlreadyReleased) => report.skipped += 1,
                Err(e) => {
                    warn!(booking_id = %booking_id, error = %e, "auto-release failed");
                    report.failures.push(SweepFailure {
                        booking_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                released = report.released,
                failed = report.failures.len(),
                "auto-release pass finished"
            );
        }
        Ok(report)
    }

    // === Refund ===

    pub async fn refund_payment(
        &self,
        booking_id: &str,
        reason: &str,
        cancelled_by: &str,
    ) -> BusinessResult<RefundOutcome> {
        self.refund_payment_at(booking_id, reason, cancelled_by, Utc::now()).await
    }

    /// Cancels a paid booking. The refund share follows the time left
    /// before the session; the client transfer is queued, not performed.
    pub async fn refund_payment_at(
        &self,
        booking_id: &str,
        reason: &str,
        cancelled_by: &str,
        now: DateTime<Utc>,
    ) -> BusinessResult<RefundOutcome> {
        let mut tx = self.ctx.begin().await?;
        let mut booking = lock_booking(&mut tx, booking_id).await?;

        if booking.status == BookingStatus::Refunded {
            return Err(BusinessError::conflict(format!(
                "booking {} is already refunded",
                booking_id
            )));
        }
        if booking.client_payment_status != ClientPaymentStatus::Completed {
            return Err(BusinessError::conflict(format!(
                "booking {} client payment is {}, nothing to refund",
                booking_id,
                booking.client_payment_status.as_str()
            )));
        }
        if booking.payout_status == PayoutStatus::Completed {
            return Err(BusinessError::conflict(format!(
                "booking {} payout was already released to the lawyer",
                booking_id
            )));
        }

        let hours_until_session = hours_until(booking.scheduled_start_time, now);
        let policy = RefundPolicy::from_hours_until(hours_until_session);
        let client_refund_amount = policy.refund_amount(booking.gross_amount);
        let mut reversed_hold = Decimal::ZERO;

        if booking.payout_status == PayoutStatus::Pending {
            let mut wallet = lock_wallet(&mut tx, &booking.lawyer_id).await?;
            require_open_hold(&mut tx, booking_id).await?;

            reversed_hold = booking.lawyer_payout;
            wallet.reverse_hold(reversed_hold)?;
            wallet.updated_at = now;

            let entry = WalletTransaction::new(
                &wallet.id,
                TransactionType::Refund,
                TransactionStatus::Completed,
                -reversed_hold,
                wallet.balance,
                wallet.balance,
                now,
            )
            .with_booking(booking_id)
            .with_description(format!("Escrow reversed: {}", reason))
            .with_metadata(serde_json::json!({
                "policy": policy.as_str(),
                "refund_percent": policy.percent(),
                "client_refund_amount": client_refund_amount,
                "hours_until_session": hours_until_session.round_dp(3),
                "cancelled_by": cancelled_by,
                "reason": reason,
            }));

            WalletRepo::save(&mut *tx, &wallet).await?;
            WalletTransactionRepo::insert(&mut *tx, &entry).await?;
        }

        booking.status = BookingStatus::Refunded;
        booking.payout_status = PayoutStatus::Failed;
        if client_refund_amount > Decimal::ZERO {
            booking.client_payment_status = ClientPaymentStatus::Refunded;
        }
        booking.cancelled_by = Some(cancelled_by.to_string());
        booking.cancellation_reason = Some(reason.to_string());
        booking.updated_at = now;
        BookingRepo::save(&mut *tx, &booking).await?;

        if client_refund_amount > Decimal::ZERO {
            let refund = ClientRefundRow {
                id: format!("RFD_{}", uuid::Uuid::new_v4().simple()),
                booking_id: booking.id.clone(),
                client_id: booking.client_id.clone(),
                amount: client_refund_amount.to_string(),
                refund_percent: policy.percent().to_string(),
                currency: booking.currency.clone(),
                status: "QUEUED".to_string(),
                reason: Some(reason.to_string()),
                created_at: now,
            };
            ClientRefundRepo::insert(&mut *tx, &refund).await?;
        }
        tx.commit().await?;

        info!(
            booking_id,
            policy = %policy,
            client_refund = %client_refund_amount,
            reversed_hold = %reversed_hold,
            cancelled_by,
            "booking refunded"
        );
        Ok(RefundOutcome {
            booking_id: booking_id.to_string(),
            policy,
            refund_percent: policy.percent(),
            client_refund_amount,
            reversed_hold,
        })
    }

    // === Queries ===

    pub async fn get_booking(&self, booking_id: &str) -> BusinessResult<Booking> {
        let mut conn = self.ctx.pool().acquire().await?;
        BookingRepo::get_by_id(&mut conn, booking_id)
            .await?
            .ok_or_else(|| BusinessError::not_found("Booking", booking_id))
    }

    pub async fn list_bookings(&self, lawyer_id: &str) -> BusinessResult<Vec<Booking>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(BookingRepo::list_by_lawyer(&mut conn, lawyer_id).await?)
    }

    /// Records a booking created by the marketplace.
    pub async fn register_booking(&self, booking: &Booking) -> BusinessResult<()> {
        let mut conn = self.ctx.pool().acquire().await?;
        BookingRepo::insert(&mut conn, booking).await?;
        info!(booking_id = %booking.id, lawyer_id = %booking.lawyer_id, gross = %booking.gross_amount, "booking registered");
        Ok(())
    }

    pub async fn list_client_refunds(&self, status: Option<&str>) -> BusinessResult<Vec<ClientRefundRow>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(ClientRefundRepo::list(&mut conn, status).await?)
    }
}

/// Hold inside a caller-owned transaction, so a payment confirmation and
/// its hold commit together.
pub(crate) async fn hold_in(
    conn: &mut SqliteConnection,
    settings: &LedgerSettings,
    booking_id: &str,
    lawyer_payout: Decimal,
    lawyer_id: &str,
    now: DateTime<Utc>,
) -> BusinessResult<HoldOutcome> {
    ensure_money_amount(lawyer_payout)?;

    if WalletRepo::ensure(&mut *conn, lawyer_id, &settings.currency, now).await? {
        info!(lawyer_id, currency = %settings.currency, "wallet created");
    }
    let mut wallet = lock_wallet(&mut *conn, lawyer_id).await?;

    // a replayed hold answers the same even after a freeze
    if WalletTransactionRepo::find_booking_entry(
        &mut *conn,
        booking_id,
        TransactionType::Payout,
        TransactionStatus::Pending,
    )
    .await?
    .is_some()
    {
        return Ok(HoldOutcome::AlreadyHeld);
    }
    wallet.ensure_active()?;

    wallet.hold(lawyer_payout)?;
    wallet.updated_at = now;
    let entry = WalletTransaction::new(
        &wallet.id,
        TransactionType::Payout,
        TransactionStatus::Pending,
        lawyer_payout,
        wallet.balance,
        wallet.balance,
        now,
    )
    .with_booking(booking_id)
    .with_description("Escrow hold for consultation");

    WalletRepo::save(&mut *conn, &wallet).await?;
    WalletTransactionRepo::insert(&mut *conn, &entry).await?;

    info!(
        booking_id,
        lawyer_id,
        amount = %lawyer_payout,
        pending_balance = %wallet.pending_balance,
        "payout held in escrow"
    );
    Ok(HoldOutcome::Held)
}

pub(crate) async fn lock_booking(conn: &mut SqliteConnection, booking_id: &str) -> BusinessResult<Booking> {
    BookingRepo::lock(conn, booking_id)
        .await?
        .ok_or_else(|| BusinessError::not_found("Booking", booking_id))
}

async fn require_open_hold(conn: &mut SqliteConnection, booking_id: &str) -> BusinessResult<()> {
    let hold = WalletTransactionRepo::find_booking_entry(
        conn,
        booking_id,
        TransactionType::Payout,
        TransactionStatus::Pending,
    )
    .await?;
    if hold.is_none() {
        return Err(BusinessError::conflict(format!(
            "booking {} has no escrow hold",
            booking_id
        )));
    }
    Ok(())
}
