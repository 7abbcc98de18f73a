//! # Transaction Module
//!
//! Immutable wallet audit entries. The log is append-only: a PENDING entry
//! is superseded by a later COMPLETED entry for the same logical event,
//! never updated in place.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Escrowed (PENDING) or released (COMPLETED) lawyer earnings
    Payout,
    /// Reversal of an escrow hold after a cancellation
    Refund,
    /// Funds paid out of the platform
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payout => "PAYOUT",
            TransactionType::Refund => "REFUND",
            TransactionType::Withdrawal => "WITHDRAWAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PAYOUT" => Some(TransactionType::Payout),
            "REFUND" => Some(TransactionType::Refund),
            "WITHDRAWAL" => Some(TransactionType::Withdrawal),
            _ => None,
        }
    }

    /// Whether a COMPLETED entry of this type moves `balance`.
    ///
    /// REFUND entries only reverse `pending_balance`, so they are left out
    /// of the balance reconciliation sum.
    pub fn moves_balance(&self) -> bool {
        matches!(self, TransactionType::Payout | TransactionType::Withdrawal)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(TransactionStatus::Pending),
            "COMPLETED" => Some(TransactionStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audit entry in a wallet's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: String,
    pub wallet_id: String,
    pub booking_id: Option<String>,
    pub tx_type: TransactionType,
    /// Signed: negative for REFUND and WITHDRAWAL
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn new(
        wallet_id: &str,
        tx_type: TransactionType,
        status: TransactionStatus,
        amount: Decimal,
        balance_before: Decimal,
        balance_after: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("WTX_{}", Uuid::new_v4().simple()),
            wallet_id: wallet_id.to_string(),
            booking_id: None,
            tx_type,
            amount,
            balance_before,
            balance_after,
            status,
            description: None,
            metadata: serde_json::Value::Object(Default::default()),
            created_at: now,
        }
    }

    pub fn with_booking(mut self, booking_id: &str) -> Self {
        self.booking_id = Some(booking_id.to_string());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Signed contribution of this entry to the wallet `balance`.
    pub fn balance_effect(&self) -> Decimal {
        if self.status == TransactionStatus::Completed && self.tx_type.moves_balance() {
            self.amount
        } else {
            Decimal::ZERO
        }
    }
}

/// Recomputes `balance` from a wallet's log.
///
/// Not every COMPLETED entry counts. A COMPLETED REFUND reverses an escrow
/// hold, which only ever sat in `pending_balance`, so adding its negative
/// amount would push `balance` below what the lawyer actually earned. Only
/// PAYOUT and WITHDRAWAL entries ([`TransactionType::moves_balance`]) are
/// summed; refunds are checked against `pending_balance` by reconciliation.
pub fn ledger_balance<'a>(entries: impl IntoIterator<Item = &'a WalletTransaction>) -> Decimal {
    entries.into_iter().map(WalletTransaction::balance_effect).sum()
}
