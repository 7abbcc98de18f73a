//! Database schema definitions
//!
//! Row types for sqlx mapping from SQLite tables.
//! The schema itself lives in migrations/20261018000000_init.sql

use crate::error::{PersistenceError, PersistenceResult};
use chrono::{DateTime, Utc};
use lexvault_core::{
    Booking, BookingStatus, ClientPaymentStatus, PayoutDestination, PayoutStatus,
    TransactionStatus, TransactionType, Wallet, WalletTransaction, WithdrawalMethod,
    WithdrawalRequest, WithdrawalStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Row type for the `wallets` table
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct WalletRow {
    pub id: String,
    pub lawyer_id: String,
    pub balance: String, // Decimal stored as TEXT
    pub pending_balance: String,
    pub available_balance: String,
    pub currency: String,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for the `wallet_transactions` table
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct WalletTransactionRow {
    pub id: String,
    pub wallet_id: String,
    pub booking_id: Option<String>,
    pub tx_type: String,
    pub amount: String,
    pub balance_before: String,
    pub balance_after: String,
    pub status: String,
    pub description: Option<String>,
    pub metadata: String, // JSON
    pub created_at: DateTime<Utc>,
}

/// Row type for the `bookings` table
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct BookingRow {
    pub id: String,
    pub client_id: String,
    pub lawyer_id: String,
    pub gross_amount: String,
    pub platform_commission: String,
    pub lawyer_payout: String,
    pub currency: String,
    pub client_payment_status: String,
    pub payout_status: String,
    pub status: String,
    pub scheduled_start_time: DateTime<Utc>,
    pub scheduled_end_time: DateTime<Utc>,
    pub payment_reference: Option<String>,
    pub payout_settled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for the `withdrawal_requests` table
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct WithdrawalRow {
    pub id: String,
    pub lawyer_id: String,
    pub amount: String,
    pub method: String,
    pub destination: String, // JSON
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub failure_reason: Option<String>,
    pub provider_transaction_id: Option<String>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

/// Row type for the `client_refunds` table
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct ClientRefundRow {
    pub id: String,
    pub booking_id: String,
    pub client_id: String,
    pub amount: String,
    pub refund_percent: String,
    pub currency: String,
    pub status: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

// === Conversion implementations ===

pub(crate) fn parse_decimal(field: &str, value: &str) -> PersistenceResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| PersistenceError::InvalidDecimal(format!("{} = '{}': {}", field, value, e)))
}

impl TryFrom<WalletRow> for Wallet {
    type Error = PersistenceError;

    fn try_from(row: WalletRow) -> PersistenceResult<Self> {
        Ok(Wallet {
            balance: parse_decimal("balance", &row.balance)?,
            pending_balance: parse_decimal("pending_balance", &row.pending_balance)?,
            available_balance: parse_decimal("available_balance", &row.available_balance)?,
            id: row.id,
            lawyer_id: row.lawyer_id,
            currency: row.currency,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<WalletTransactionRow> for WalletTransaction {
    type Error = PersistenceError;

    fn try_from(row: WalletTransactionRow) -> PersistenceResult<Self> {
        Ok(WalletTransaction {
            tx_type: TransactionType::from_str(&row.tx_type)
                .ok_or_else(|| PersistenceError::invalid_enum("tx_type", &row.tx_type))?,
            status: TransactionStatus::from_str(&row.status)
                .ok_or_else(|| PersistenceError::invalid_enum("status", &row.status))?,
            amount: parse_decimal("amount", &row.amount)?,
            balance_before: parse_decimal("balance_before", &row.balance_before)?,
            balance_after: parse_decimal("balance_after", &row.balance_after)?,
            metadata: serde_json::from_str(&row.metadata)?,
            id: row.id,
            wallet_id: row.wallet_id,
            booking_id: row.booking_id,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<BookingRow> for Booking {
    type Error = PersistenceError;

    fn try_from(row: BookingRow) -> PersistenceResult<Self> {
        Ok(Booking {
            gross_amount: parse_decimal("gross_amount", &row.gross_amount)?,
            platform_commission: parse_decimal("platform_commission", &row.platform_commission)?,
            lawyer_payout: parse_decimal("lawyer_payout", &row.lawyer_payout)?,
            client_payment_status: ClientPaymentStatus::from_str(&row.client_payment_status)
                .ok_or_else(|| {
                    PersistenceError::invalid_enum(
                        "client_payment_status",
                        &row.client_payment_status,
                    )
                })?,
            payout_status: PayoutStatus::from_str(&row.payout_status).ok_or_else(|| {
                PersistenceError::invalid_enum("payout_status", &row.payout_status)
            })?,
            status: BookingStatus::from_str(&row.status)
                .ok_or_else(|| PersistenceError::invalid_enum("status", &row.status))?,
            id: row.id,
            client_id: row.client_id,
            lawyer_id: row.lawyer_id,
            currency: row.currency,
            scheduled_start_time: row.scheduled_start_time,
            scheduled_end_time: row.scheduled_end_time,
            payment_reference: row.payment_reference,
            payout_settled_at: row.payout_settled_at,
            cancelled_by: row.cancelled_by,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<WithdrawalRow> for WithdrawalRequest {
    type Error = PersistenceError;

    fn try_from(row: WithdrawalRow) -> PersistenceResult<Self> {
        let destination: PayoutDestination = serde_json::from_str(&row.destination)?;
        let method = WithdrawalMethod::from_str(&row.method)
            .ok_or_else(|| PersistenceError::invalid_enum("method", &row.method))?;
        if destination.method() != method {
            return Err(PersistenceError::invalid_enum("destination", &row.destination));
        }
        Ok(WithdrawalRequest {
            amount: parse_decimal("amount", &row.amount)?,
            status: WithdrawalStatus::from_str(&row.status)
                .ok_or_else(|| PersistenceError::invalid_enum("status", &row.status))?,
            method,
            destination,
            id: row.id,
            lawyer_id: row.lawyer_id,
            requested_at: row.requested_at,
            processed_at: row.processed_at,
            completed_at: row.completed_at,
            processed_by: row.processed_by,
            rejection_reason: row.rejection_reason,
            failure_reason: row.failure_reason,
            provider_transaction_id: row.provider_transaction_id,
            updated_at: row.updated_at,
        })
    }
}

impl ClientRefundRow {
    pub fn amount(&self) -> PersistenceResult<Decimal> {
        parse_decimal("amount", &self.amount)
    }
}
