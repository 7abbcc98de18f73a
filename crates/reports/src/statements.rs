//! Ledger statements, withdrawal reports and reconciliation sheets

use crate::exporters::ReportData;
use chrono::{DateTime, Utc};
use lexvault_business::ReconciliationReport;
use lexvault_core::{
    ledger_balance, BalanceSnapshot, Currency, Wallet, WalletTransaction, WithdrawalRequest,
    WithdrawalStats,
};

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

// ============================================================================
// Ledger statement
// ============================================================================

/// One lawyer's wallet log with the current balances
#[derive(Debug, Clone)]
pub struct LedgerStatement {
    pub title: String,
    pub lawyer_id: String,
    pub currency: Currency,
    pub balances: BalanceSnapshot,
    pub is_active: bool,
    pub entries: Vec<WalletTransaction>,
    pub generated_at: DateTime<Utc>,
}

impl LedgerStatement {
    pub fn new(wallet: &Wallet, entries: Vec<WalletTransaction>, generated_at: DateTime<Utc>) -> Self {
        Self {
            title: format!("Ledger statement - {}", wallet.lawyer_id),
            lawyer_id: wallet.lawyer_id.clone(),
            currency: Currency::from_code(&wallet.currency),
            balances: wallet.snapshot(),
            is_active: wallet.is_active,
            entries,
            generated_at,
        }
    }
}

impl ReportData for LedgerStatement {
    fn title(&self) -> &str {
        &self.title
    }

    fn headers(&self) -> Vec<String> {
        ["Date", "Entry", "Type", "Status", "Booking", "Amount", "Balance After", "Description"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.entries
            .iter()
            .map(|e| {
                vec![
                    timestamp(e.created_at),
                    e.id.clone(),
                    e.tx_type.to_string(),
                    e.status.to_string(),
                    e.booking_id.clone().unwrap_or_default(),
                    self.currency.format_amount(e.amount),
                    self.currency.format_amount(e.balance_after),
                    e.description.clone().unwrap_or_default(),
                ]
            })
            .collect()
    }

    fn summary(&self) -> Vec<(String, String)> {
        vec![
            ("Lawyer".to_string(), self.lawyer_id.clone()),
            ("Balance".to_string(), self.currency.format_amount(self.balances.balance)),
            (
                "In escrow".to_string(),
                self.currency.format_amount(self.balances.pending_balance),
            ),
            (
                "Available".to_string(),
                self.currency.format_amount(self.balances.available_balance),
            ),
            (
                "Ledger balance".to_string(),
                self.currency.format_amount(ledger_balance(&self.entries)),
            ),
            ("Wallet".to_string(), if self.is_active { "active" } else { "frozen" }.to_string()),
            ("Entries".to_string(), self.entries.len().to_string()),
            ("Generated".to_string(), self.generated_at.to_rfc3339()),
        ]
    }
}

// ============================================================================
// Withdrawal report
// ============================================================================

#[derive(Debug, Clone)]
pub struct WithdrawalReport {
    pub title: String,
    pub currency: Currency,
    pub requests: Vec<WithdrawalRequest>,
    pub stats: WithdrawalStats,
    pub generated_at: DateTime<Utc>,
}

impl WithdrawalReport {
    pub fn new(title: &str, currency: Currency, requests: Vec<WithdrawalRequest>, generated_at: DateTime<Utc>) -> Self {
        let stats = WithdrawalStats::from_requests(&requests);
        Self {
            title: title.to_string(),
            currency,
            requests,
            stats,
            generated_at,
        }
    }
}

impl ReportData for WithdrawalReport {
    fn title(&self) -> &str {
        &self.title
    }

    fn headers(&self) -> Vec<String> {
        ["Requested", "Request", "Lawyer", "Method", "Destination", "Amount", "Status", "Provider Ref"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.requests
            .iter()
            .map(|r| {
                vec![
                    timestamp(r.requested_at),
                    r.id.clone(),
                    r.lawyer_id.clone(),
                    r.method.to_string(),
                    r.destination.label(),
                    self.currency.format_amount(r.amount),
                    r.status.to_string(),
                    r.provider_transaction_id.clone().unwrap_or_default(),
                ]
            })
            .collect()
    }

    fn summary(&self) -> Vec<(String, String)> {
        let s = &self.stats;
        vec![
            ("Requests".to_string(), s.request_count.to_string()),
            ("Requested".to_string(), self.currency.format_amount(s.total_requested)),
            ("Completed".to_string(), self.currency.format_amount(s.total_completed)),
            ("In flight".to_string(), self.currency.format_amount(s.total_pending)),
            ("Failed".to_string(), self.currency.format_amount(s.total_failed)),
            ("Rejected".to_string(), self.currency.format_amount(s.total_rejected)),
            ("Success rate".to_string(), format!("{}%", s.success_rate)),
            ("Generated".to_string(), self.generated_at.to_rfc3339()),
        ]
    }
}

// ============================================================================
// Reconciliation sheet
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReconciliationSheet {
    pub title: String,
    pub reports: Vec<ReconciliationReport>,
    pub generated_at: DateTime<Utc>,
}

impl ReconciliationSheet {
    pub fn new(reports: Vec<ReconciliationReport>, generated_at: DateTime<Utc>) -> Self {
        Self {
            title: "Wallet reconciliation".to_string(),
            reports,
            generated_at,
        }
    }

    pub fn inconsistent(&self) -> usize {
        self.reports.iter().filter(|r| !r.is_consistent()).count()
    }
}

impl ReportData for ReconciliationSheet {
    fn title(&self) -> &str {
        &self.title
    }

    fn headers(&self) -> Vec<String> {
        ["Lawyer", "Stored Balance", "Ledger Balance", "Stored Pending", "Open Holds", "Status"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.reports
            .iter()
            .map(|r| {
                vec![
                    r.lawyer_id.clone(),
                    r.stored.balance.to_string(),
                    r.ledger_balance.to_string(),
                    r.stored.pending_balance.to_string(),
                    r.ledger_pending.to_string(),
                    if r.is_consistent() { "OK" } else { "DRIFT" }.to_string(),
                ]
            })
            .collect()
    }

    fn summary(&self) -> Vec<(String, String)> {
        vec![
            ("Wallets".to_string(), self.reports.len().to_string()),
            ("Drifting".to_string(), self.inconsistent().to_string()),
            ("Generated".to_string(), self.generated_at.to_rfc3339()),
        ]
    }
}
