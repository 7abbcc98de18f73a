//! # Booking Module
//!
//! The consultation booking as seen by the escrow ledger. Only the payment
//! and payout fields are owned here; the rest of the booking lifecycle
//! belongs to the marketplace.

use crate::error::{CoreError, CoreResult};
use crate::money::{apply_rate, ensure_money_amount};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientPaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl ClientPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientPaymentStatus::Pending => "PENDING",
            ClientPaymentStatus::Completed => "COMPLETED",
            ClientPaymentStatus::Failed => "FAILED",
            ClientPaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(ClientPaymentStatus::Pending),
            "COMPLETED" => Some(ClientPaymentStatus::Completed),
            "FAILED" => Some(ClientPaymentStatus::Failed),
            "REFUNDED" => Some(ClientPaymentStatus::Refunded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Pending,
    Completed,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "PENDING",
            PayoutStatus::Completed => "COMPLETED",
            PayoutStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(PayoutStatus::Pending),
            "COMPLETED" => Some(PayoutStatus::Completed),
            "FAILED" => Some(PayoutStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Refunded => "REFUNDED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "IN_PROGRESS" => Some(BookingStatus::InProgress),
            "COMPLETED" => Some(BookingStatus::Completed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "REFUNDED" => Some(BookingStatus::Refunded),
            _ => None,
        }
    }

    /// Cancelled or refunded bookings never reach a session.
    pub fn is_closed(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Refunded)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a gross client payment divides between platform and lawyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub gross_amount: Decimal,
    pub platform_commission: Decimal,
    pub lawyer_payout: Decimal,
}

impl CommissionSplit {
    /// Commission is rounded; the lawyer gets the exact remainder.
    pub fn from_rate(gross_amount: Decimal, commission_rate: Decimal) -> CoreResult<Self> {
        ensure_money_amount(gross_amount)?;
        if commission_rate < Decimal::ZERO || commission_rate >= Decimal::ONE {
            return Err(CoreError::validation(
                "commission_rate",
                format!("must be in [0, 1), got {}", commission_rate),
            ));
        }
        let platform_commission = apply_rate(gross_amount, commission_rate);
        Ok(Self {
            gross_amount,
            platform_commission,
            lawyer_payout: gross_amount - platform_commission,
        })
    }

    /// Validates a split reported by the payment side.
    pub fn verify(
        gross_amount: Decimal,
        platform_commission: Decimal,
        lawyer_payout: Decimal,
    ) -> CoreResult<Self> {
        ensure_money_amount(lawyer_payout)?;
        if platform_commission < Decimal::ZERO {
            return Err(CoreError::validation(
                "commission",
                "commission cannot be negative",
            ));
        }
        if gross_amount - platform_commission != lawyer_payout {
            return Err(CoreError::validation(
                "lawyer_payout",
                format!(
                    "{} does not equal gross {} minus commission {}",
                    lawyer_payout, gross_amount, platform_commission
                ),
            ));
        }
        Ok(Self {
            gross_amount,
            platform_commission,
            lawyer_payout,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub client_id: String,
    pub lawyer_id: String,
    pub gross_amount: Decimal,
    pub platform_commission: Decimal,
    pub lawyer_payout: Decimal,
    pub currency: String,
    pub client_payment_status: ClientPaymentStatus,
    pub payout_status: PayoutStatus,
    pub status: BookingStatus,
    pub scheduled_start_time: DateTime<Utc>,
    pub scheduled_end_time: DateTime<Utc>,
    pub payment_reference: Option<String>,
    pub payout_settled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        client_id: &str,
        lawyer_id: &str,
        split: CommissionSplit,
        currency: &str,
        scheduled_start_time: DateTime<Utc>,
        scheduled_end_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if scheduled_end_time <= scheduled_start_time {
            return Err(CoreError::validation(
                "scheduled_end_time",
                "session must end after it starts",
            ));
        }
        Ok(Self {
            id: format!("BK_{}", Uuid::new_v4().simple()),
            client_id: client_id.to_string(),
            lawyer_id: lawyer_id.to_string(),
            gross_amount: split.gross_amount,
            platform_commission: split.platform_commission,
            lawyer_payout: split.lawyer_payout,
            currency: currency.to_uppercase(),
            client_payment_status: ClientPaymentStatus::Pending,
            payout_status: PayoutStatus::Pending,
            status: BookingStatus::Confirmed,
            scheduled_start_time,
            scheduled_end_time,
            payment_reference: None,
            payout_settled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn split(&self) -> CommissionSplit {
        CommissionSplit {
            gross_amount: self.gross_amount,
            platform_commission: self.platform_commission,
            lawyer_payout: self.lawyer_payout,
        }
    }

    /// Sweep predicate: completed session, paid, payout still escrowed and
    /// the end time at least `grace` in the past.
    pub fn is_release_due(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        self.status == BookingStatus::Completed
            && self.payout_status == PayoutStatus::Pending
            && self.client_payment_status == ClientPaymentStatus::Completed
            && self.scheduled_end_time <= now - grace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn booking(now: DateTime<Utc>) -> Booking {
        let split = CommissionSplit::from_rate(dec!(1200), dec!(0.15)).unwrap();
        Booking::new(
            "CLI_1",
            "LAW_1",
            split,
            "KES",
            now + Duration::hours(48),
            now + Duration::hours(49),
            now,
        )
        .unwrap()
    }

    #[test]
    fn test_commission_split() {
        let split = CommissionSplit::from_rate(dec!(1200), dec!(0.15)).unwrap();
        assert_eq!(split.platform_commission, dec!(180));
        assert_eq!(split.lawyer_payout, dec!(1020));

        let split = CommissionSplit::from_rate(dec!(999.99), dec!(0.125)).unwrap();
        assert_eq!(split.platform_commission, dec!(125.00));
        assert_eq!(split.lawyer_payout, dec!(874.99));
        assert_eq!(
            split.platform_commission + split.lawyer_payout,
            split.gross_amount
        );

        assert!(CommissionSplit::from_rate(dec!(100), dec!(1)).is_err());
        assert!(CommissionSplit::from_rate(dec!(0), dec!(0.1)).is_err());
    }

    #[test]
    fn test_verify_split() {
        assert!(CommissionSplit::verify(dec!(1000), dec!(150), dec!(850)).is_ok());
        let err = CommissionSplit::verify(dec!(1000), dec!(150), dec!(900)).unwrap_err();
        assert!(err.is_validation());
        assert!(CommissionSplit::verify(dec!(1000), dec!(-1), dec!(1001)).is_err());
    }

    #[test]
    fn test_new_booking() {
        let now = Utc::now();
        let b = booking(now);
        assert!(b.id.starts_with("BK_"));
        assert_eq!(b.client_payment_status, ClientPaymentStatus::Pending);
        assert_eq!(b.payout_status, PayoutStatus::Pending);
        assert_eq!(b.split().lawyer_payout, dec!(1020));

        let split = b.split();
        assert!(Booking::new("C", "L", split, "KES", now, now, now).is_err());
    }

    #[test]
    fn test_release_due() {
        let now = Utc::now();
        let mut b = booking(now);
        b.status = BookingStatus::Completed;
        b.client_payment_status = ClientPaymentStatus::Completed;
        b.scheduled_end_time = now - Duration::hours(24);
        assert!(b.is_release_due(now, Duration::hours(24)));

        b.scheduled_end_time = now - Duration::hours(23);
        assert!(!b.is_release_due(now, Duration::hours(24)));

        b.scheduled_end_time = now - Duration::hours(30);
        b.payout_status = PayoutStatus::Completed;
        assert!(!b.is_release_due(now, Duration::hours(24)));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            BookingStatus::from_str("in_progress"),
            Some(BookingStatus::InProgress)
        );
        assert!(BookingStatus::Refunded.is_closed());
        assert_eq!(PayoutStatus::from_str("FAILED"), Some(PayoutStatus::Failed));
        assert_eq!(
            ClientPaymentStatus::from_str("refunded"),
            Some(ClientPaymentStatus::Refunded)
        );
    }
}
