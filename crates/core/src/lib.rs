//! # Lexvault Core
//!
//! Pure domain types for the payment-custody ledger: money rounding,
//! wallets, bookings, withdrawal requests and the refund policy.
//! Nothing in this crate touches storage or the network.

pub mod booking;
pub mod error;
pub mod money;
pub mod refund;
pub mod transaction;
pub mod wallet;
pub mod withdrawal;

pub use booking::{Booking, BookingStatus, ClientPaymentStatus, CommissionSplit, PayoutStatus};
pub use error::{CoreError, CoreResult};
pub use money::{apply_rate, ensure_money_amount, round_money, Currency, MONEY_SCALE};
pub use refund::{hours_until, RefundPolicy};
pub use transaction::{ledger_balance, TransactionStatus, TransactionType, WalletTransaction};
pub use wallet::{BalanceSnapshot, Wallet};
pub use withdrawal::{
    normalize_phone_number, DestinationDetails, PayoutDestination, WithdrawalLimits,
    WithdrawalMethod, WithdrawalRequest, WithdrawalStats, WithdrawalStatus,
};
