//! # Lexvault Business
//!
//! Business logic layer - escrow ledger, wallet, withdrawal lifecycle,
//! payout dispatch and the auto-release sweep.
//!
//! Services borrow a shared [`ServiceContext`]:
//!
//! ```rust,ignore
//! let ctx = ServiceContext::from_config(pool, &config)?;
//! EscrowService::new(&ctx).hold_payment("BK_1", dec!(850), "LAW_001").await?;
//! EscrowService::new(&ctx).release_payment("BK_1", "client confirmed").await?;
//! ```

pub mod callbacks;
pub mod error;
pub mod escrow;
pub mod events;
pub mod payout;
pub mod services;
pub mod sweeper;
pub mod wallet;
pub mod withdrawal;

pub use callbacks::{handle_payout_callback, CallbackOutcome, PayoutCallback};
pub use error::{BusinessError, BusinessResult};
pub use escrow::{
    EscrowService, HoldOutcome, RefundOutcome, ReleaseOutcome, SweepFailure, SweepReport,
};
pub use events::{BookingEvents, CancellationRequested, PaymentConfirmed, SettlementResult};
pub use payout::{
    gateway_from_config, GatewayError, HttpPayoutGateway, PayoutDispatcher, PayoutGateway,
    PayoutInstruction, PayoutResult, SimulatedGateway, SimulatedMode,
};
pub use services::{LedgerSettings, ServiceContext};
pub use sweeper::{AutoReleaseSweeper, SweepMetrics, SweepSnapshot};
pub use wallet::{EscrowSummary, ReconciliationReport, WalletService};
pub use withdrawal::{ProcessDecision, WithdrawalService};
