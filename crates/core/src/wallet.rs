//! # Wallet Module
//!
//! Per-lawyer running balances.
//!
//! - `pending_balance`: escrowed payouts awaiting release
//! - `balance`: earned funds that have not left the platform
//! - `available_balance`: the part of `balance` not reserved by an
//!   in-flight withdrawal
//!
//! Every mutation is computed on a copy and committed only if the
//! invariants still hold, so a failed call leaves the wallet untouched.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three balances of a wallet at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub balance: Decimal,
    pub pending_balance: Decimal,
    pub available_balance: Decimal,
}

impl BalanceSnapshot {
    pub fn new(balance: Decimal, pending_balance: Decimal, available_balance: Decimal) -> Self {
        Self {
            balance,
            pending_balance,
            available_balance,
        }
    }

    pub fn zero() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
    }
}

/// A lawyer's wallet. One per lawyer, created lazily on the first hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub lawyer_id: String,
    pub balance: Decimal,
    pub pending_balance: Decimal,
    pub available_balance: Decimal,
    pub currency: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(lawyer_id: &str, currency: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("WAL_{}", Uuid::new_v4().simple()),
            lawyer_id: lawyer_id.to_string(),
            balance: Decimal::ZERO,
            pending_balance: Decimal::ZERO,
            available_balance: Decimal::ZERO,
            currency: currency.to_uppercase(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot::new(self.balance, self.pending_balance, self.available_balance)
    }

    pub fn ensure_active(&self) -> CoreResult<()> {
        if self.is_active {
            Ok(())
        } else {
            Err(CoreError::WalletInactive(self.lawyer_id.clone()))
        }
    }

    /// Non-negative balances and `available_balance <= balance`.
    pub fn check_invariants(&self) -> CoreResult<()> {
        for (name, value) in [
            ("balance", self.balance),
            ("pending_balance", self.pending_balance),
            ("available_balance", self.available_balance),
        ] {
            if value < Decimal::ZERO {
                return Err(CoreError::InvariantViolation(format!(
                    "wallet {} {} would be negative ({})",
                    self.id, name, value
                )));
            }
        }
        if self.available_balance > self.balance {
            return Err(CoreError::InvariantViolation(format!(
                "wallet {} available_balance {} exceeds balance {}",
                self.id, self.available_balance, self.balance
            )));
        }
        Ok(())
    }

    // === Escrow ===

    /// Escrows a payout: `pending_balance += amount`.
    pub fn hold(&mut self, amount: Decimal) -> CoreResult<()> {
        self.apply(amount, |w| w.pending_balance += amount)
    }

    /// Settles an escrowed payout into earned funds.
    pub fn release(&mut self, amount: Decimal) -> CoreResult<()> {
        self.apply(amount, |w| {
            w.pending_balance -= amount;
            w.balance += amount;
            w.available_balance += amount;
        })
    }

    /// Drops an escrowed payout after a refund: `pending_balance -= amount`.
    pub fn reverse_hold(&mut self, amount: Decimal) -> CoreResult<()> {
        self.apply(amount, |w| w.pending_balance -= amount)
    }

    // === Withdrawal reservations ===

    /// Reserves funds for a withdrawal: `available_balance -= amount`.
    pub fn reserve(&mut self, amount: Decimal) -> CoreResult<()> {
        if amount > self.available_balance {
            return Err(CoreError::InsufficientFunds {
                requested: amount,
                available: self.available_balance,
            });
        }
        self.apply(amount, |w| w.available_balance -= amount)
    }

    /// Gives a reservation back after reject, cancel or payout failure.
    pub fn restore(&mut self, amount: Decimal) -> CoreResult<()> {
        self.apply(amount, |w| w.available_balance += amount)
    }

    /// Debits a completed withdrawal whose amount was already reserved.
    pub fn settle_withdrawal(&mut self, amount: Decimal) -> CoreResult<()> {
        self.apply(amount, |w| w.balance -= amount)
    }

    fn apply(&mut self, amount: Decimal, op: impl FnOnce(&mut Wallet)) -> CoreResult<()> {
        if amount <= Decimal::ZERO {
            return Err(CoreError::InvalidAmount(format!(
                "wallet movement must be positive, got {}",
                amount
            )));
        }
        let mut next = self.clone();
        op(&mut next);
        next.check_invariants()?;
        *self = next;
        Ok(())
    }
}
