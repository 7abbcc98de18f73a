//! Service runtime and administrative commands

use anyhow::{Context, Result};
use lexvault_api::AppState;
use lexvault_business::{
    AutoReleaseSweeper, EscrowService, ProcessDecision, ReconciliationReport, ServiceContext,
    SweepMetrics, WalletService, WithdrawalService,
};
use lexvault_config::LexvaultConfig;
use lexvault_core::WithdrawalRequest;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use super::parse_status;
use crate::db;
use crate::AdminAction;

// ============================================================================
// Runtime
// ============================================================================

/// Run the API until ctrl-c, with the sweeper alongside unless disabled
pub async fn serve(config: &LexvaultConfig, listen: Option<SocketAddr>, no_sweeper: bool) -> Result<()> {
    let ctx = Arc::new(db::connect(config).await?);
    let metrics = Arc::new(SweepMetrics::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = if config.escrow.sweep_enabled && !no_sweeper {
        let interval = Duration::from_secs(config.escrow.sweep_interval_secs);
        Some(
            AutoReleaseSweeper::new(ctx.clone(), interval)
                .with_metrics(metrics.clone())
                .spawn(shutdown_rx),
        )
    } else {
        info!("auto-release sweeper disabled");
        None
    };

    let addr = listen.unwrap_or(config.server.listen);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("shutdown requested");
    };
    let served = lexvault_api::serve(listener, AppState::new(ctx.clone(), metrics), signal).await;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            error!(error = %e, "sweeper task ended abnormally");
        }
    }
    ctx.pool().close().await;
    served.context("API server failed")
}

/// One auto-release pass
pub async fn sweep(config: &LexvaultConfig) -> Result<()> {
    let ctx = db::connect(config).await?;
    let report = EscrowService::new(&ctx).auto_release_expired_bookings().await?;

    println!("🧹 Auto-release sweep");
    println!("   Examined: {}", report.examined);
    println!("   Released: {}", report.released);
    println!("   Skipped:  {}", report.skipped);
    for failure in &report.failures {
        println!("   ❌ {}: {}", failure.booking_id, failure.error);
    }

    ctx.pool().close().await;
    Ok(())
}

// ============================================================================
// Admin actions
// ============================================================================

/// Handle admin subcommands
pub async fn handle(config: &LexvaultConfig, action: AdminAction) -> Result<()> {
    let ctx = db::connect(config).await?;
    let withdrawals = WithdrawalService::new(&ctx);

    match action {
        AdminAction::Approve { request_id, admin } => {
            let decision = ProcessDecision {
                approved: true,
                rejection_reason: None,
            };
            let request = withdrawals
                .process_withdrawal_request(&request_id, &admin, decision)
                .await?;
            print_request(&ctx, &request);
        }

        AdminAction::Reject {
            request_id,
            reason,
            admin,
        } => {
            let decision = ProcessDecision {
                approved: false,
                rejection_reason: Some(reason),
            };
            let request = withdrawals
                .process_withdrawal_request(&request_id, &admin, decision)
                .await?;
            print_request(&ctx, &request);
        }

        AdminAction::Complete {
            request_id,
            reference,
        } => {
            let request = withdrawals.complete_withdrawal(&request_id, &reference).await?;
            print_request(&ctx, &request);
        }

        AdminAction::Fail { request_id, reason } => {
            let request = withdrawals.fail_withdrawal(&request_id, &reason).await?;
            print_request(&ctx, &request);
        }

        AdminAction::Queue { status } => {
            let status = parse_status(status.as_deref())?;
            let requests = withdrawals.list_all_withdrawals(status).await?;
            let currency = ctx.settings().currency();
            println!("📋 Withdrawal queue ({})", requests.len());
            for r in requests {
                println!(
                    "   {}  {:<10} {:<11} {:>14}  {}",
                    r.requested_at.format("%Y-%m-%d %H:%M"),
                    r.lawyer_id,
                    r.status,
                    currency.format_amount(r.amount),
                    r.id
                );
            }
        }

        AdminAction::Freeze { lawyer_id } => {
            WalletService::new(&ctx).set_wallet_active(&lawyer_id, false).await?;
            println!("🔒 Wallet of {} frozen", lawyer_id);
        }

        AdminAction::Unfreeze { lawyer_id } => {
            WalletService::new(&ctx).set_wallet_active(&lawyer_id, true).await?;
            println!("🔓 Wallet of {} active", lawyer_id);
        }

        AdminAction::Refunds { status } => {
            let status = status.map(|s| s.to_uppercase());
            let refunds = EscrowService::new(&ctx)
                .list_client_refunds(status.as_deref())
                .await?;
            println!("↩️  Client refunds ({})", refunds.len());
            for r in refunds {
                println!(
                    "   {}  {:<8} {} {:>12} ({}%)  {}",
                    r.created_at.format("%Y-%m-%d %H:%M"),
                    r.status,
                    r.currency,
                    r.amount,
                    r.refund_percent,
                    r.booking_id
                );
            }
        }

        AdminAction::Reconcile { lawyer_id } => {
            let wallets = WalletService::new(&ctx);
            let reports = match lawyer_id {
                Some(lawyer_id) => vec![wallets.reconcile(&lawyer_id).await?],
                None => wallets.reconcile_all().await?,
            };
            print_reconciliation(&reports);
        }
    }

    ctx.pool().close().await;
    Ok(())
}

fn print_request(ctx: &ServiceContext, request: &WithdrawalRequest) {
    let currency = ctx.settings().currency();
    println!("💸 Withdrawal {}", request.id);
    println!("   Lawyer:  {}", request.lawyer_id);
    println!("   Amount:  {}", currency.format_amount(request.amount));
    println!("   Method:  {} ({})", request.method, request.destination.label());
    println!("   Status:  {}", request.status);
    if let Some(id) = &request.provider_transaction_id {
        println!("   Ref:     {}", id);
    }
    if let Some(reason) = request.rejection_reason.as_ref().or(request.failure_reason.as_ref()) {
        println!("   Reason:  {}", reason);
    }
}

fn print_reconciliation(reports: &[ReconciliationReport]) {
    let drifting = reports.iter().filter(|r| !r.is_consistent()).count();
    println!("🔎 Reconciled {} wallet(s), {} drifting", reports.len(), drifting);
    for r in reports {
        let mark = if r.is_consistent() { "✅" } else { "❌" };
        println!(
            "   {} {:<12} balance {} (log {})  escrow {} (log {})",
            mark,
            r.lawyer_id,
            r.stored.balance,
            r.ledger_balance,
            r.stored.pending_balance,
            r.ledger_pending
        );
    }
}
