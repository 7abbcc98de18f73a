//! Wallet queries and booking lifecycle commands

use anyhow::Result;
use chrono::{Duration, Utc};
use lexvault_business::{
    BookingEvents, CancellationRequested, EscrowService, PaymentConfirmed, ReleaseOutcome,
    ServiceContext, WalletService, WithdrawalService,
};
use lexvault_config::LexvaultConfig;
use lexvault_core::{Booking, CommissionSplit, Currency};
use rust_decimal::Decimal;

use super::{parse_status, truncate};
use crate::db;
use crate::{BookingAction, WalletAction};

/// Handle wallet subcommands
pub async fn wallet(config: &LexvaultConfig, action: WalletAction) -> Result<()> {
    let ctx = db::connect(config).await?;

    match action {
        WalletAction::Balance { lawyer_id } => show_balance(&ctx, &lawyer_id).await?,
        WalletAction::Transactions { lawyer_id } => show_transactions(&ctx, &lawyer_id).await?,
        WalletAction::Withdrawals { lawyer_id, status } => {
            let status = parse_status(status.as_deref())?;
            let requests = WithdrawalService::new(&ctx)
                .list_withdrawals(&lawyer_id, status)
                .await?;
            let currency = ctx.settings().currency();
            println!("💸 Withdrawals for {} ({})", lawyer_id, requests.len());
            for r in requests {
                println!(
                    "   {}  {:<11} {:<14} {:>14}  {}",
                    r.requested_at.format("%Y-%m-%d %H:%M"),
                    r.status,
                    r.method,
                    currency.format_amount(r.amount),
                    r.id
                );
            }
        }
        WalletAction::Stats { lawyer_id } => {
            let stats = WithdrawalService::new(&ctx).get_stats(&lawyer_id).await?;
            let currency = ctx.settings().currency();
            println!("📈 Withdrawal stats for {}", lawyer_id);
            println!("   Requests:     {}", stats.request_count);
            println!("   Requested:    {}", currency.format_amount(stats.total_requested));
            println!("   Completed:    {}", currency.format_amount(stats.total_completed));
            println!("   In flight:    {}", currency.format_amount(stats.total_pending));
            println!("   Failed:       {}", currency.format_amount(stats.total_failed));
            println!("   Rejected:     {}", currency.format_amount(stats.total_rejected));
            println!("   Success rate: {}%", stats.success_rate);
        }
    }

    ctx.pool().close().await;
    Ok(())
}

async fn show_balance(ctx: &ServiceContext, lawyer_id: &str) -> Result<()> {
    let summary = WalletService::new(ctx).get_escrow_summary(lawyer_id).await?;
    let currency = Currency::from_code(&summary.currency);

    println!("💰 Wallet of {}", summary.lawyer_id);
    println!("   Balance:    {}", currency.format_amount(summary.balance));
    println!("   In escrow:  {}", currency.format_amount(summary.pending_balance));
    println!("   Available:  {}", currency.format_amount(summary.available_balance));
    println!("   Open holds: {}", summary.pending_transactions.len());
    if !summary.is_active {
        println!("   ⚠️  Wallet is frozen");
    }
    Ok(())
}

async fn show_transactions(ctx: &ServiceContext, lawyer_id: &str) -> Result<()> {
    let entries = WalletService::new(ctx).list_transactions(lawyer_id).await?;
    let currency = ctx.settings().currency();

    if entries.is_empty() {
        println!("No ledger entries for {}", lawyer_id);
        return Ok(());
    }

    println!("📒 Ledger for {} ({} entries)", lawyer_id, entries.len());
    for e in entries {
        println!(
            "   {}  {:<10} {:<9} {:>14}  {}",
            e.created_at.format("%Y-%m-%d %H:%M"),
            e.tx_type,
            e.status,
            currency.format_amount(e.amount),
            truncate(e.description.as_deref().unwrap_or(""), 40)
        );
    }
    Ok(())
}

/// Handle booking subcommands
pub async fn booking(config: &LexvaultConfig, action: BookingAction) -> Result<()> {
    let ctx = db::connect(config).await?;

    match action {
        BookingAction::Seed {
            lawyer_id,
            gross,
            client,
            starts_in,
            duration,
            paid,
        } => seed_booking(&ctx, &lawyer_id, &client, gross, starts_in, duration, paid).await?,

        BookingAction::Show { booking_id } => {
            let booking = EscrowService::new(&ctx).get_booking(&booking_id).await?;
            print_booking(&booking);
        }

        BookingAction::List { lawyer_id } => {
            let bookings = EscrowService::new(&ctx).list_bookings(&lawyer_id).await?;
            let currency = ctx.settings().currency();
            println!("📅 Bookings for {} ({})", lawyer_id, bookings.len());
            for b in bookings {
                println!(
                    "   {}  {:<10} {:<9} {:<9} {:>14}  {}",
                    b.scheduled_start_time.format("%Y-%m-%d %H:%M"),
                    b.status,
                    b.client_payment_status.as_str(),
                    b.payout_status.as_str(),
                    currency.format_amount(b.lawyer_payout),
                    b.id
                );
            }
        }

        BookingAction::Complete { booking_id } => {
            let status = BookingEvents::new(&ctx).on_session_completed(&booking_id).await?;
            println!("✅ Booking {} is {}", booking_id, status);
        }

        BookingAction::Release { booking_id, reason } => {
            match EscrowService::new(&ctx).release_payment(&booking_id, &reason).await? {
                ReleaseOutcome::Released { amount } => {
                    let currency = ctx.settings().currency();
                    println!("✅ Released {} to the lawyer", currency.format_amount(amount));
                }
                ReleaseOutcome::AlreadyReleased => {
                    println!("ℹ️  Booking {} was already released", booking_id);
                }
            }
        }

        BookingAction::Cancel {
            booking_id,
            reason,
            by,
        } => {
            let outcome = BookingEvents::new(&ctx)
                .on_cancellation_requested(&CancellationRequested {
                    booking_id,
                    cancelled_by: by,
                    reason,
                })
                .await?;
            let currency = ctx.settings().currency();
            println!("✅ Booking {} refunded", outcome.booking_id);
            println!("   Policy:        {} ({}%)", outcome.policy, outcome.refund_percent);
            println!("   Client refund: {}", currency.format_amount(outcome.client_refund_amount));
            println!("   Hold reversed: {}", currency.format_amount(outcome.reversed_hold));
        }
    }

    ctx.pool().close().await;
    Ok(())
}

async fn seed_booking(
    ctx: &ServiceContext,
    lawyer_id: &str,
    client_id: &str,
    gross: Decimal,
    starts_in: i64,
    duration: i64,
    paid: bool,
) -> Result<()> {
    let now = Utc::now();
    let split = CommissionSplit::from_rate(gross, ctx.settings().commission_rate)?;
    let start = now + Duration::hours(starts_in);
    let booking = Booking::new(
        client_id,
        lawyer_id,
        split,
        &ctx.settings().currency,
        start,
        start + Duration::hours(duration),
        now,
    )?;
    EscrowService::new(ctx).register_booking(&booking).await?;
    println!("✅ Booking {} registered", booking.id);

    if paid {
        let outcome = BookingEvents::new(ctx)
            .on_payment_confirmed(&PaymentConfirmed {
                booking_id: booking.id.clone(),
                lawyer_id: lawyer_id.to_string(),
                gross_amount: split.gross_amount,
                commission: split.platform_commission,
                lawyer_payout: split.lawyer_payout,
                payment_reference: Some(format!("SEED-{}", now.timestamp())),
            })
            .await?;
        println!("   Payment confirmed: {:?}", outcome);
    }

    print_booking(&EscrowService::new(ctx).get_booking(&booking.id).await?);
    Ok(())
}

fn print_booking(booking: &Booking) {
    let currency = Currency::from_code(&booking.currency);
    println!("📅 Booking {}", booking.id);
    println!("   Lawyer:     {}", booking.lawyer_id);
    println!("   Client:     {}", booking.client_id);
    println!("   Status:     {}", booking.status);
    println!("   Payment:    {}", booking.client_payment_status.as_str());
    println!("   Payout:     {}", booking.payout_status.as_str());
    println!("   Gross:      {}", currency.format_amount(booking.gross_amount));
    println!("   Commission: {}", currency.format_amount(booking.platform_commission));
    println!("   To lawyer:  {}", currency.format_amount(booking.lawyer_payout));
    println!(
        "   Session:    {} - {}",
        booking.scheduled_start_time.format("%Y-%m-%d %H:%M"),
        booking.scheduled_end_time.format("%H:%M")
    );
    if let Some(reason) = &booking.cancellation_reason {
        println!("   Cancelled:  {}", reason);
    }
}
