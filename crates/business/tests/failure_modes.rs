//! Mobile money provider failures. Each one must end FAILED with the
//! reservation restored and `balance` untouched.

mod common;

use common::*;
use lexvault_business::{
    LedgerSettings, ProcessDecision, SimulatedMode, WithdrawalService,
};
use lexvault_core::{WithdrawalMethod, WithdrawalRequest, WithdrawalStatus};
use rust_decimal_macros::dec;
use std::time::Duration;

async fn approve_with(h: &Harness, mode: SimulatedMode) -> WithdrawalRequest {
    h.fund(LAWYER, dec!(1000)).await;
    h.gateway.set_mode(mode);
    let service = WithdrawalService::new(&h.ctx);
    let request = service
        .create_withdrawal_request(LAWYER, dec!(500), WithdrawalMethod::MobileMoney, &mpesa())
        .await
        .unwrap();
    service
        .process_withdrawal_request(
            &request.id,
            "ADMIN_1",
            ProcessDecision {
                approved: true,
                rejection_reason: None,
            },
        )
        .await
        .unwrap()
}

async fn assert_restored(h: &Harness, request: &WithdrawalRequest) {
    assert_eq!(request.status, WithdrawalStatus::Failed);
    assert!(request.failure_reason.is_some());
    assert!(request.provider_transaction_id.is_none());
    assert_eq!(h.snapshot(LAWYER).await, snapshot(dec!(1000), dec!(0), dec!(1000)));
    h.assert_reconciles(LAWYER).await;
}

#[tokio::test]
async fn test_provider_rejection() {
    let h = harness().await;
    let request = approve_with(&h, SimulatedMode::Reject("insufficient float".to_string())).await;
    assert_restored(&h, &request).await;
    assert!(request.failure_reason.unwrap().contains("insufficient float"));
}

#[tokio::test]
async fn test_transport_error() {
    let h = harness().await;
    let request = approve_with(&h, SimulatedMode::TransportError("connection reset".to_string())).await;
    assert_restored(&h, &request).await;
}

#[tokio::test]
async fn test_success_without_transaction_id_is_failure() {
    let h = harness().await;
    let request = approve_with(&h, SimulatedMode::Malformed).await;
    assert_restored(&h, &request).await;
}

#[tokio::test]
async fn test_timeout_restores_funds() {
    let settings = LedgerSettings::default().with_payout_timeout(Duration::from_millis(50));
    let h = harness_with(settings).await;
    let request = approve_with(&h, SimulatedMode::Hang).await;
    assert_restored(&h, &request).await;
    assert!(request.failure_reason.unwrap().to_lowercase().contains("timed out"));
}

#[tokio::test]
async fn test_failed_request_frees_the_in_flight_slot() {
    let h = harness().await;
    approve_with(&h, SimulatedMode::Reject("invalid destination".to_string())).await;

    h.gateway.set_mode(SimulatedMode::Succeed);
    let service = WithdrawalService::new(&h.ctx);
    let retry = service
        .create_withdrawal_request(LAWYER, dec!(500), WithdrawalMethod::MobileMoney, &mpesa())
        .await
        .unwrap();
    let done = service
        .process_withdrawal_request(
            &retry.id,
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
    assert_eq!(h.gateway.sent().len(), 2);
}

/// Makes every status change to one of `statuses` abort like a storage fault.
async fn break_status_writes(h: &Harness, statuses: &[&str]) {
    let list = statuses
        .iter()
        .map(|s| format!("'{}'", s))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "CREATE TRIGGER break_status_writes BEFORE UPDATE OF status ON withdrawal_requests \
         WHEN NEW.status IN ({}) BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END",
        list
    );
    sqlx::query(&sql).execute(h.ctx.pool()).await.unwrap();
}

async fn heal_status_writes(h: &Harness) {
    sqlx::query("DROP TRIGGER break_status_writes")
        .execute(h.ctx.pool())
        .await
        .unwrap();
}

async fn pending_request(h: &Harness) -> WithdrawalRequest {
    h.fund(LAWYER, dec!(1000)).await;
    WithdrawalService::new(&h.ctx)
        .create_withdrawal_request(LAWYER, dec!(500), WithdrawalMethod::MobileMoney, &mpesa())
        .await
        .unwrap()
}

fn approval() -> ProcessDecision {
    ProcessDecision {
        approved: true,
        rejection_reason: None,
    }
}

#[tokio::test]
async fn test_storage_fault_at_dispatch_fails_the_approval() {
    let h = harness().await;
    let request = pending_request(&h).await;
    break_status_writes(&h, &["PROCESSING"]).await;

    let service = WithdrawalService::new(&h.ctx);
    let failed = service
        .process_withdrawal_request(&request.id, "ADMIN_1", approval())
        .await
        .unwrap();
    assert!(failed.failure_reason.as_deref().unwrap().starts_with("dispatch failed"));
    assert_restored(&h, &failed).await;
    assert!(h.gateway.sent().is_empty());

    heal_status_writes(&h).await;
    let retry = service
        .create_withdrawal_request(LAWYER, dec!(500), WithdrawalMethod::MobileMoney, &mpesa())
        .await
        .unwrap();
    assert_eq!(retry.status, WithdrawalStatus::Pending);
}

#[tokio::test]
async fn test_admin_fails_an_approval_stuck_before_dispatch() {
    let h = harness().await;
    let request = pending_request(&h).await;
    break_status_writes(&h, &["PROCESSING", "FAILED"]).await;

    let service = WithdrawalService::new(&h.ctx);
    let err = service
        .process_withdrawal_request(&request.id, "ADMIN_1", approval())
        .await
        .unwrap_err();
    assert!(!err.is_state_conflict());

    let stuck = service.get_withdrawal(&request.id).await.unwrap();
    assert_eq!(stuck.status, WithdrawalStatus::Approved);
    assert_eq!(h.snapshot(LAWYER).await, snapshot(dec!(1000), dec!(0), dec!(500)));

    heal_status_writes(&h).await;
    let failed = service
        .fail_withdrawal(&request.id, "dispatch never ran")
        .await
        .unwrap();
    assert_eq!(failed.failure_reason.as_deref(), Some("dispatch never ran"));
    assert_restored(&h, &failed).await;
    assert!(h.gateway.sent().is_empty());
}
