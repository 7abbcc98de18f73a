//! Report generation

use anyhow::{bail, Context, Result};
use chrono::Utc;
use lexvault_business::{WalletService, WithdrawalService};
use lexvault_config::LexvaultConfig;
use lexvault_reports::{
    LedgerStatement, ReconciliationSheet, ReportData, ReportExporter, WithdrawalReport,
};
use std::fs;
use std::path::PathBuf;

use crate::db;
use crate::{FormatArg, ReportType};

/// Generate a report
pub async fn generate(
    config: &LexvaultConfig,
    kind: ReportType,
    lawyer: Option<String>,
    format: FormatArg,
    output: Option<PathBuf>,
) -> Result<()> {
    let ctx = db::connect(config).await?;
    let exporter = format.to_report_format().exporter();
    let now = Utc::now();

    let content = match kind {
        ReportType::Ledger => {
            let Some(lawyer_id) = lawyer else {
                bail!("A ledger statement needs --lawyer");
            };
            let wallets = WalletService::new(&ctx);
            let wallet = wallets.get_wallet(&lawyer_id).await?;
            let entries = wallets.list_transactions(&lawyer_id).await?;
            render(exporter.as_ref(), &LedgerStatement::new(&wallet, entries, now))
        }
        ReportType::Withdrawals => {
            let service = WithdrawalService::new(&ctx);
            let (title, requests) = match &lawyer {
                Some(lawyer_id) => (
                    format!("Withdrawals - {}", lawyer_id),
                    service.list_withdrawals(lawyer_id, None).await?,
                ),
                None => (
                    "Withdrawals - all lawyers".to_string(),
                    service.list_all_withdrawals(None).await?,
                ),
            };
            let report = WithdrawalReport::new(&title, ctx.settings().currency(), requests, now);
            render(exporter.as_ref(), &report)
        }
        ReportType::Reconciliation => {
            let wallets = WalletService::new(&ctx);
            let reports = match &lawyer {
                Some(lawyer_id) => vec![wallets.reconcile(lawyer_id).await?],
                None => wallets.reconcile_all().await?,
            };
            let sheet = ReconciliationSheet::new(reports, now);
            if sheet.inconsistent() > 0 {
                eprintln!("⚠️  {} wallet(s) do not reconcile", sheet.inconsistent());
            }
            render(exporter.as_ref(), &sheet)
        }
    };

    match output {
        Some(path) => {
            fs::write(&path, &content).context("Failed to write report file")?;
            println!("✅ Report generated: {}", path.display());
        }
        None => {
            println!("{}", content);
        }
    }

    ctx.pool().close().await;
    Ok(())
}

fn render(exporter: &dyn ReportExporter, report: &dyn ReportData) -> String {
    exporter.export(report)
}
