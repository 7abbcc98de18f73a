//! # Lexvault Reports
//!
//! Read-only reports over the ledger, rendered by one of three exporters.
//!
//! ## Exporters
//!
//! - [`CsvExporter`] - CSV with quoting
//! - [`JsonExporter`] - JSON (pretty or compact)
//! - [`MarkdownExporter`] - Markdown tables
//!
//! ## Reports
//!
//! - [`LedgerStatement`] - a lawyer's wallet log and balances
//! - [`WithdrawalReport`] - withdrawal requests with totals and success rate
//! - [`ReconciliationSheet`] - stored balances against the log
//!
//! ## Example
//!
//! ```rust,ignore
//! use lexvault_reports::{LedgerStatement, ReportFormat};
//!
//! let statement = LedgerStatement::new(&wallet, entries, Utc::now());
//! let output = ReportFormat::Csv.exporter().export(&statement);
//! ```

pub mod exporters;
pub mod statements;

pub use exporters::{
    CsvExporter, JsonExporter, MarkdownExporter, ReportData, ReportExporter, ReportFormat,
};
pub use statements::{LedgerStatement, ReconciliationSheet, WithdrawalReport};
