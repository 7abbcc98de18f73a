//! # Withdrawal Module
//!
//! Withdrawal requests and their state machine:
//!
//! ```text
//! PENDING --approve--> APPROVED --dispatch--> PROCESSING --payout ok--> COMPLETED
//! PENDING --reject---> REJECTED
//! PENDING --cancel---> CANCELLED
//! APPROVED | PROCESSING --payout failure--> FAILED
//! ```
//!
//! All status changes go through [`WithdrawalRequest::transition`].

use crate::error::{CoreError, CoreResult};
use crate::money::ensure_money_amount;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Method & status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalMethod {
    MobileMoney,
    BankTransfer,
}

impl WithdrawalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalMethod::MobileMoney => "MOBILE_MONEY",
            WithdrawalMethod::BankTransfer => "BANK_TRANSFER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "MOBILE_MONEY" | "MPESA" => Some(WithdrawalMethod::MobileMoney),
            "BANK_TRANSFER" | "BANK" => Some(WithdrawalMethod::BankTransfer),
            _ => None,
        }
    }
}

impl fmt::Display for WithdrawalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Processing,
    Completed,
    Rejected,
    Failed,
    Cancelled,
}

impl WithdrawalStatus {
    pub const ALL: [WithdrawalStatus; 7] = [
        WithdrawalStatus::Pending,
        WithdrawalStatus::Approved,
        WithdrawalStatus::Processing,
        WithdrawalStatus::Completed,
        WithdrawalStatus::Rejected,
        WithdrawalStatus::Failed,
        WithdrawalStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "PENDING",
            WithdrawalStatus::Approved => "APPROVED",
            WithdrawalStatus::Processing => "PROCESSING",
            WithdrawalStatus::Completed => "COMPLETED",
            WithdrawalStatus::Rejected => "REJECTED",
            WithdrawalStatus::Failed => "FAILED",
            WithdrawalStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Completed
                | WithdrawalStatus::Rejected
                | WithdrawalStatus::Failed
                | WithdrawalStatus::Cancelled
        )
    }

    /// Statuses that hold a reservation on `available_balance`.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Pending | WithdrawalStatus::Approved | WithdrawalStatus::Processing
        )
    }

    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        use WithdrawalStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Approved, Processing)
                | (Approved, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Destination
// ============================================================================

/// Destination fields as submitted by the lawyer. Which ones are required
/// depends on the method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationDetails {
    pub phone_number: Option<String>,
    pub account_name: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub branch_code: Option<String>,
}

impl DestinationDetails {
    pub fn mobile_money(phone_number: &str, account_name: &str) -> Self {
        Self {
            phone_number: Some(phone_number.to_string()),
            account_name: Some(account_name.to_string()),
            ..Default::default()
        }
    }

    pub fn bank(bank_name: &str, account_number: &str, account_name: &str) -> Self {
        Self {
            bank_name: Some(bank_name.to_string()),
            account_number: Some(account_number.to_string()),
            account_name: Some(account_name.to_string()),
            ..Default::default()
        }
    }

    /// Checks completeness for `method` and returns the typed destination.
    pub fn validate_for(&self, method: WithdrawalMethod) -> CoreResult<PayoutDestination> {
        match method {
            WithdrawalMethod::MobileMoney => {
                let raw = required(&self.phone_number, "phone_number")?;
                let phone_number = normalize_phone_number(raw).ok_or_else(|| {
                    CoreError::validation(
                        "phone_number",
                        format!("'{}' is not a valid mobile number", raw),
                    )
                })?;
                Ok(PayoutDestination::MobileMoney {
                    phone_number,
                    account_name: required(&self.account_name, "account_name")?.to_string(),
                })
            }
            WithdrawalMethod::BankTransfer => {
                let account_number = required(&self.account_number, "account_number")?;
                if !account_number.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(CoreError::validation(
                        "account_number",
                        "must contain only letters and digits",
                    ));
                }
                Ok(PayoutDestination::BankTransfer {
                    bank_name: required(&self.bank_name, "bank_name")?.to_string(),
                    account_number: account_number.to_string(),
                    account_name: required(&self.account_name, "account_name")?.to_string(),
                    branch_code: self
                        .branch_code
                        .as_deref()
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                })
            }
        }
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> CoreResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CoreError::validation(field, "is required"))
}

/// Normalizes a Kenyan mobile number to `2547XXXXXXXX` / `2541XXXXXXXX`.
///
/// Accepts `+254`, `254` and `0` prefixes; spaces and dashes are ignored.
pub fn normalize_phone_number(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let subscriber = compact
        .strip_prefix("+254")
        .or_else(|| compact.strip_prefix("254"))
        .or_else(|| compact.strip_prefix('0'))?;

    let valid = subscriber.len() == 9
        && subscriber.chars().all(|c| c.is_ascii_digit())
        && (subscriber.starts_with('7') || subscriber.starts_with('1'));
    valid.then(|| format!("254{}", subscriber))
}

/// A validated payout destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutDestination {
    MobileMoney {
        phone_number: String,
        account_name: String,
    },
    BankTransfer {
        bank_name: String,
        account_number: String,
        account_name: String,
        branch_code: Option<String>,
    },
}

impl PayoutDestination {
    pub fn method(&self) -> WithdrawalMethod {
        match self {
            PayoutDestination::MobileMoney { .. } => WithdrawalMethod::MobileMoney,
            PayoutDestination::BankTransfer { .. } => WithdrawalMethod::BankTransfer,
        }
    }

    /// Short, partially masked label for logs and statements.
    pub fn label(&self) -> String {
        match self {
            PayoutDestination::MobileMoney { phone_number, .. } => {
                format!("M-Pesa ***{}", tail(phone_number, 4))
            }
            PayoutDestination::BankTransfer {
                bank_name,
                account_number,
                ..
            } => format!("{} ***{}", bank_name, tail(account_number, 4)),
        }
    }
}

fn tail(s: &str, n: usize) -> &str {
    let start = s.len().saturating_sub(n);
    s.get(start..).unwrap_or(s)
}

// ============================================================================
// Limits
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalLimits {
    pub min_amount: Decimal,
    pub mobile_money_max: Decimal,
}

impl Default for WithdrawalLimits {
    fn default() -> Self {
        Self {
            min_amount: Decimal::from(100),
            mobile_money_max: Decimal::from(150_000),
        }
    }
}

impl WithdrawalLimits {
    pub fn check(&self, amount: Decimal, method: WithdrawalMethod) -> CoreResult<()> {
        ensure_money_amount(amount)?;
        if amount < self.min_amount {
            return Err(CoreError::validation(
                "amount",
                format!("minimum withdrawal is {}", self.min_amount),
            ));
        }
        if method == WithdrawalMethod::MobileMoney && amount > self.mobile_money_max {
            return Err(CoreError::validation(
                "amount",
                format!("mobile money withdrawals are limited to {}", self.mobile_money_max),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: String,
    pub lawyer_id: String,
    pub amount: Decimal,
    pub method: WithdrawalMethod,
    pub destination: PayoutDestination,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub failure_reason: Option<String>,
    pub provider_transaction_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl WithdrawalRequest {
    pub fn new(
        lawyer_id: &str,
        amount: Decimal,
        destination: PayoutDestination,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("WDR_{}", Uuid::new_v4().simple()),
            lawyer_id: lawyer_id.to_string(),
            amount,
            method: destination.method(),
            destination,
            status: WithdrawalStatus::Pending,
            requested_at: now,
            processed_at: None,
            completed_at: None,
            processed_by: None,
            rejection_reason: None,
            failure_reason: None,
            provider_transaction_id: None,
            updated_at: now,
        }
    }

    /// The single guarded status change.
    pub fn transition(&mut self, next: WithdrawalStatus, now: DateTime<Utc>) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::IllegalTransition {
                entity: "withdrawal",
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        self.updated_at = now;
        match next {
            WithdrawalStatus::Approved
            | WithdrawalStatus::Rejected
            | WithdrawalStatus::Cancelled => self.processed_at = Some(now),
            WithdrawalStatus::Completed => self.completed_at = Some(now),
            _ => {}
        }
        Ok(())
    }

    pub fn approve(&mut self, processed_by: &str, now: DateTime<Utc>) -> CoreResult<()> {
        self.transition(WithdrawalStatus::Approved, now)?;
        self.processed_by = Some(processed_by.to_string());
        Ok(())
    }

    pub fn reject(
        &mut self,
        processed_by: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.transition(WithdrawalStatus::Rejected, now)?;
        self.processed_by = Some(processed_by.to_string());
        self.rejection_reason = reason;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.transition(WithdrawalStatus::Cancelled, now)
    }

    pub fn mark_processing(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.transition(WithdrawalStatus::Processing, now)
    }

    pub fn complete(&mut self, provider_transaction_id: &str, now: DateTime<Utc>) -> CoreResult<()> {
        if provider_transaction_id.trim().is_empty() {
            return Err(CoreError::validation(
                "provider_transaction_id",
                "is required",
            ));
        }
        self.transition(WithdrawalStatus::Completed, now)?;
        self.provider_transaction_id = Some(provider_transaction_id.trim().to_string());
        Ok(())
    }

    pub fn fail(&mut self, reason: &str, now: DateTime<Utc>) -> CoreResult<()> {
        self.transition(WithdrawalStatus::Failed, now)?;
        self.failure_reason = Some(reason.to_string());
        Ok(())
    }
}

// ============================================================================
// Stats
// ============================================================================

/// Per-lawyer withdrawal totals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WithdrawalStats {
    pub total_requested: Decimal,
    pub total_completed: Decimal,
    pub total_pending: Decimal,
    pub total_failed: Decimal,
    pub total_rejected: Decimal,
    pub total_cancelled: Decimal,
    pub request_count: u64,
    pub completed_count: u64,
    pub failed_count: u64,
    pub rejected_count: u64,
    /// Completed share of resolved (completed, failed, rejected) requests, in percent
    pub success_rate: Decimal,
}

impl WithdrawalStats {
    pub fn from_requests<'a>(requests: impl IntoIterator<Item = &'a WithdrawalRequest>) -> Self {
        let mut stats = WithdrawalStats::default();
        for req in requests {
            stats.request_count += 1;
            stats.total_requested += req.amount;
            match req.status {
                WithdrawalStatus::Completed => {
                    stats.total_completed += req.amount;
                    stats.completed_count += 1;
                }
                WithdrawalStatus::Failed => {
                    stats.total_failed += req.amount;
                    stats.failed_count += 1;
                }
                WithdrawalStatus::Rejected => {
                    stats.total_rejected += req.amount;
                    stats.rejected_count += 1;
                }
                WithdrawalStatus::Cancelled => stats.total_cancelled += req.amount,
                s if s.is_in_flight() => stats.total_pending += req.amount,
                _ => {}
            }
        }

        let resolved = stats.completed_count + stats.failed_count + stats.rejected_count;
        if resolved > 0 {
            stats.success_rate = crate::money::round_money(
                Decimal::from(stats.completed_count) * Decimal::from(100) / Decimal::from(resolved),
            );
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn mpesa() -> PayoutDestination {
        DestinationDetails::mobile_money("0712 345 678", "Jane Wanjiku")
            .validate_for(WithdrawalMethod::MobileMoney)
            .unwrap()
    }

    fn request(amount: Decimal) -> WithdrawalRequest {
        WithdrawalRequest::new("LAW_1", amount, mpesa(), Utc::now())
    }

    #[test]
    fn test_transition_table() {
        use WithdrawalStatus::*;
        let allowed = [
            (Pending, Approved),
            (Pending, Rejected),
            (Pending, Cancelled),
            (Approved, Processing),
            (Approved, Failed),
            (Processing, Completed),
            (Processing, Failed),
        ];
        for from in WithdrawalStatus::ALL {
            for to in WithdrawalStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_terminal_and_in_flight() {
        for s in WithdrawalStatus::ALL {
            assert_ne!(s.is_terminal(), s.is_in_flight());
            if s.is_terminal() {
                assert!(WithdrawalStatus::ALL.iter().all(|t| !s.can_transition_to(*t)));
            }
        }
    }

    #[test]
    fn test_happy_path_timestamps() {
        let mut req = request(dec!(500));
        let now = Utc::now();
        req.approve("ADM_1", now).unwrap();
        assert_eq!(req.processed_at, Some(now));
        assert_eq!(req.processed_by.as_deref(), Some("ADM_1"));

        req.mark_processing(now).unwrap();
        req.complete(" MPX123 ", now).unwrap();
        assert_eq!(req.status, WithdrawalStatus::Completed);
        assert_eq!(req.completed_at, Some(now));
        assert_eq!(req.provider_transaction_id.as_deref(), Some("MPX123"));
    }

    #[test]
    fn test_illegal_transition_leaves_request_unchanged() {
        let mut req = request(dec!(500));
        let before = req.clone();
        let err = req.complete("X", Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::IllegalTransition { .. }));
        assert_eq!(req, before);

        req.approve("ADM", Utc::now()).unwrap();
        assert!(req.cancel(Utc::now()).is_err());
        assert!(req.complete("", Utc::now()).is_err());
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(normalize_phone_number("+254712345678").as_deref(), Some("254712345678"));
        assert_eq!(normalize_phone_number("254112345678").as_deref(), Some("254112345678"));
        assert_eq!(normalize_phone_number("0712-345-678").as_deref(), Some("254712345678"));
        assert_eq!(normalize_phone_number("0812345678"), None);
        assert_eq!(normalize_phone_number("07123456"), None);
        assert_eq!(normalize_phone_number("+2547123456789"), None);
        assert_eq!(normalize_phone_number("07123x5678"), None);
        assert_eq!(normalize_phone_number(""), None);
    }

    #[test]
    fn test_destination_validation() {
        let dest = mpesa();
        assert_eq!(dest.method(), WithdrawalMethod::MobileMoney);
        assert_eq!(dest.label(), "M-Pesa ***5678");

        let err = DestinationDetails {
            phone_number: Some("0712345678".into()),
            ..Default::default()
        }
        .validate_for(WithdrawalMethod::MobileMoney)
        .unwrap_err();
        assert_eq!(err, CoreError::validation("account_name", "is required"));

        let bank = DestinationDetails::bank("KCB", "1234567890", "Jane Wanjiku")
            .validate_for(WithdrawalMethod::BankTransfer)
            .unwrap();
        assert_eq!(bank.method(), WithdrawalMethod::BankTransfer);

        let err = DestinationDetails::bank("KCB", "  ", "Jane")
            .validate_for(WithdrawalMethod::BankTransfer)
            .unwrap_err();
        assert_eq!(err, CoreError::validation("account_number", "is required"));

        // mobile fields do not satisfy a bank transfer
        assert!(DestinationDetails::mobile_money("0712345678", "Jane")
            .validate_for(WithdrawalMethod::BankTransfer)
            .is_err());
    }

    #[test]
    fn test_destination_serde_is_tagged() {
        let json = serde_json::to_value(mpesa()).unwrap();
        assert_eq!(json["method"], "MOBILE_MONEY");
        assert_eq!(json["phone_number"], "254712345678");
        let back: PayoutDestination = serde_json::from_value(json).unwrap();
        assert_eq!(back, mpesa());
    }

    #[test]
    fn test_limits() {
        let limits = WithdrawalLimits::default();
        assert!(limits.check(dec!(100), WithdrawalMethod::MobileMoney).is_ok());
        assert!(limits.check(dec!(99.99), WithdrawalMethod::MobileMoney).is_err());
        assert!(limits.check(dec!(150000), WithdrawalMethod::MobileMoney).is_ok());
        assert!(limits.check(dec!(150000.01), WithdrawalMethod::MobileMoney).is_err());
        assert!(limits.check(dec!(500000), WithdrawalMethod::BankTransfer).is_ok());
    }

    #[test]
    fn test_stats() {
        let now = Utc::now();
        let mut done = request(dec!(500));
        done.approve("A", now).unwrap();
        done.mark_processing(now).unwrap();
        done.complete("P1", now).unwrap();

        let mut failed = request(dec!(300));
        failed.approve("A", now).unwrap();
        failed.fail("timeout", now).unwrap();

        let mut cancelled = request(dec!(200));
        cancelled.cancel(now).unwrap();

        let pending = request(dec!(150));

        let stats = WithdrawalStats::from_requests(&[done, failed, cancelled, pending]);
        assert_eq!(stats.request_count, 4);
        assert_eq!(stats.total_requested, dec!(1150));
        assert_eq!(stats.total_completed, dec!(500));
        assert_eq!(stats.total_failed, dec!(300));
        assert_eq!(stats.total_cancelled, dec!(200));
        assert_eq!(stats.total_pending, dec!(150));
        assert_eq!(stats.success_rate, dec!(50));

        let empty = WithdrawalStats::from_requests(Vec::<WithdrawalRequest>::new().iter());
        assert_eq!(empty.success_rate, Decimal::ZERO);
    }
}
