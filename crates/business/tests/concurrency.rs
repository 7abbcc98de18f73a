//! Racing writers on the same wallet or booking

mod common;

use common::*;
use lexvault_business::{EscrowService, ReleaseOutcome, WithdrawalService};
use lexvault_core::WithdrawalMethod;
use rust_decimal_macros::dec;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_releases_pay_once() {
    let h = harness().await;
    let booking = h.paid_booking(LAWYER, dec!(850)).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ctx = h.ctx.clone();
        let booking_id = booking.id.clone();
        handles.push(tokio::spawn(async move {
            EscrowService::new(&ctx)
                .release_payment(&booking_id, "client confirmed")
                .await
        }));
    }

    let mut released = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            ReleaseOutcome::Released { .. } => released += 1,
            ReleaseOutcome::AlreadyReleased => {}
        }
    }
    assert_eq!(released, 1);
    assert_eq!(h.snapshot(LAWYER).await, snapshot(dec!(850), dec!(0), dec!(850)));
    h.assert_reconciles(LAWYER).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_withdrawals_allow_one_in_flight() {
    let h = harness().await;
    h.fund(LAWYER, dec!(1000)).await;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let ctx = h.ctx.clone();
        handles.push(tokio::spawn(async move {
            WithdrawalService::new(&ctx)
                .create_withdrawal_request(LAWYER, dec!(400), WithdrawalMethod::MobileMoney, &mpesa())
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert!(e.is_state_conflict(), "unexpected error: {e}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(h.snapshot(LAWYER).await, snapshot(dec!(1000), dec!(0), dec!(600)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_holds_for_many_bookings() {
    let h = harness().await;
    let mut bookings = Vec::new();
    for _ in 0..10 {
        bookings.push(h.booking(LAWYER, dec!(100), chrono::Duration::hours(48)).await);
    }

    let mut handles = Vec::new();
    for booking in bookings {
        let ctx = h.ctx.clone();
        handles.push(tokio::spawn(async move {
            EscrowService::new(&ctx)
                .hold_payment(&booking.id, booking.lawyer_payout, &booking.lawyer_id)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.snapshot(LAWYER).await, snapshot(dec!(0), dec!(1000), dec!(0)));
    h.assert_reconciles(LAWYER).await;
}
