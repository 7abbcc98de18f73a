//! Booking to payout, end to end

mod common;

use chrono::Duration;
use common::*;
use lexvault_business::{
    AutoReleaseSweeper, BookingEvents, EscrowService, ProcessDecision, ReleaseOutcome,
    WalletService, WithdrawalService,
};
use lexvault_core::{
    BalanceSnapshot, CommissionSplit, TransactionStatus, TransactionType, WithdrawalMethod,
    WithdrawalStatus,
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_hold_release_withdraw_complete() {
    let h = harness().await;
    let escrow = EscrowService::new(&h.ctx);
    let withdrawals = WithdrawalService::new(&h.ctx);

    let booking = h.booking(LAWYER, dec!(1000), Duration::hours(48)).await;
    h.confirm(&booking).await;
    assert_eq!(h.snapshot(LAWYER).await, snapshot(dec!(0), dec!(1000), dec!(0)));

    let released = escrow.release_payment(&booking.id, "client confirmed").await.unwrap();
    assert_eq!(released, ReleaseOutcome::Released { amount: dec!(1000) });
    assert_eq!(h.snapshot(LAWYER).await, snapshot(dec!(1000), dec!(0), dec!(1000)));

    let request = withdrawals
        .create_withdrawal_request(LAWYER, dec!(500), WithdrawalMethod::MobileMoney, &mpesa())
        .await
        .unwrap();
    assert_eq!(request.status, WithdrawalStatus::Pending);
    assert_eq!(h.snapshot(LAWYER).await, snapshot(dec!(1000), dec!(0), dec!(500)));

    let done = withdrawals
        .process_withdrawal_request(
            &request.id,
            "ADMIN_1",
            ProcessDecision {
                approved: true,
                rejection_reason: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(done.status, WithdrawalStatus::Completed);
    assert_eq!(h.snapshot(LAWYER).await, snapshot(dec!(500), dec!(0), dec!(500)));

    let stats = withdrawals.get_stats(LAWYER).await.unwrap();
    assert_eq!(stats.total_completed, dec!(500));
    assert_eq!(stats.total_pending, dec!(0));
    assert_eq!(stats.success_rate, dec!(100));

    let log = WalletService::new(&h.ctx).list_transactions(LAWYER).await.unwrap();
    let kinds: Vec<_> = log.iter().map(|t| (t.tx_type, t.status)).collect();
    assert_eq!(
        kinds,
        vec![
            (TransactionType::Payout, TransactionStatus::Pending),
            (TransactionType::Payout, TransactionStatus::Completed),
            (TransactionType::Withdrawal, TransactionStatus::Completed),
        ]
    );
    h.assert_reconciles(LAWYER).await;
}

#[tokio::test]
async fn test_sweeper_run_once_records_metrics() {
    let h = harness().await;
    let booking = h.paid_booking(LAWYER, dec!(850)).await;
    BookingEvents::new(&h.ctx)
        .on_session_completed(&booking.id)
        .await
        .unwrap();

    let sweeper = AutoReleaseSweeper::new(h.ctx.clone(), std::time::Duration::from_secs(3600));
    let metrics = sweeper.metrics();

    // session has not ended yet, nothing is due
    let report = sweeper.run_once().await.unwrap();
    assert_eq!(report.released, 0);
    let snap = metrics.snapshot();
    assert_eq!(snap.runs, 1);
    assert!(snap.last_success_at.is_some());
    assert_eq!(h.snapshot(LAWYER).await, snapshot(dec!(0), dec!(850), dec!(0)));
}

#[tokio::test]
async fn test_sweeper_stops_on_shutdown() {
    let h = harness().await;
    let sweeper = AutoReleaseSweeper::new(h.ctx.clone(), std::time::Duration::from_millis(20));
    let metrics = sweeper.metrics();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let handle = sweeper.spawn(shutdown_rx);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert!(metrics.snapshot().runs >= 1);
}

#[tokio::test]
async fn test_many_bookings_reconcile() {
    let h = harness().await;
    let escrow = EscrowService::new(&h.ctx);
    let mut expected = BalanceSnapshot::zero();

    for (i, gross) in [dec!(1000), dec!(2500), dec!(333.33), dec!(4200)].into_iter().enumerate() {
        let split = CommissionSplit::from_rate(gross, h.ctx.settings().commission_rate).unwrap();
        let booking = h.booking(LAWYER, split.lawyer_payout, Duration::hours(48)).await;
        h.confirm(&booking).await;
        if i % 2 == 0 {
            escrow.release_payment(&booking.id, "client confirmed").await.unwrap();
            expected.balance += split.lawyer_payout;
            expected.available_balance += split.lawyer_payout;
        } else {
            expected.pending_balance += split.lawyer_payout;
        }
    }

    assert_eq!(h.snapshot(LAWYER).await, expected);
    let reports = WalletService::new(&h.ctx).reconcile_all().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_consistent());
    assert_eq!(reports[0].ledger_balance, expected.balance);
    assert_eq!(reports[0].ledger_pending, expected.pending_balance);
}
