//! Shared setup for business integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use lexvault_business::{
    BookingEvents, EscrowService, LedgerSettings, PaymentConfirmed, PayoutGateway,
    ServiceContext, SimulatedGateway, WalletService,
};
use lexvault_core::{BalanceSnapshot, Booking, CommissionSplit, DestinationDetails};
use lexvault_persistence::init_database;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::TempDir;

pub const LAWYER: &str = "LAW_001";
pub const CLIENT: &str = "CLI_001";

pub struct Harness {
    pub ctx: Arc<ServiceContext>,
    pub gateway: Arc<SimulatedGateway>,
    _dir: TempDir,
}

pub async fn harness() -> Harness {
    harness_with(LedgerSettings::default()).await
}

pub async fn harness_with(settings: LedgerSettings) -> Harness {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("lexvault.db").display());
    let pool = init_database(&url, 5).await.unwrap();
    let gateway = Arc::new(SimulatedGateway::succeeding());
    let ctx = ServiceContext::new(pool, settings, gateway.clone() as Arc<dyn PayoutGateway>);
    Harness {
        ctx: Arc::new(ctx),
        gateway,
        _dir: dir,
    }
}

impl Harness {
    /// Registers a booking whose session starts `starts_in` from `now`
    /// and lasts one hour. Client payment is still PENDING.
    pub async fn booking(&self, lawyer_id: &str, lawyer_payout: Decimal, starts_in: Duration) -> Booking {
        let split = CommissionSplit::verify(lawyer_payout + dec!(150), dec!(150), lawyer_payout).unwrap();
        let start = Utc::now() + starts_in;
        let booking = Booking::new(CLIENT, lawyer_id, split, "KES", start, start + Duration::hours(1), Utc::now())
            .unwrap();
        EscrowService::new(&self.ctx).register_booking(&booking).await.unwrap();
        booking
    }

    /// A booking two days out with the payment confirmed and the payout held.
    pub async fn paid_booking(&self, lawyer_id: &str, lawyer_payout: Decimal) -> Booking {
        let booking = self.booking(lawyer_id, lawyer_payout, Duration::hours(48)).await;
        self.confirm(&booking).await;
        EscrowService::new(&self.ctx).get_booking(&booking.id).await.unwrap()
    }

    pub async fn confirm(&self, booking: &Booking) {
        BookingEvents::new(&self.ctx)
            .on_payment_confirmed(&confirmation(booking))
            .await
            .unwrap();
    }

    /// A paid and released booking, leaving `amount` available.
    pub async fn fund(&self, lawyer_id: &str, amount: Decimal) -> Booking {
        let booking = self.paid_booking(lawyer_id, amount).await;
        EscrowService::new(&self.ctx)
            .release_payment(&booking.id, "client confirmed")
            .await
            .unwrap();
        booking
    }

    pub async fn snapshot(&self, lawyer_id: &str) -> BalanceSnapshot {
        WalletService::new(&self.ctx)
            .get_wallet(lawyer_id)
            .await
            .unwrap()
            .snapshot()
    }

    pub async fn assert_reconciles(&self, lawyer_id: &str) {
        let report = WalletService::new(&self.ctx).reconcile(lawyer_id).await.unwrap();
        assert!(report.is_consistent(), "drift: {:?}", report);
    }
}

pub fn confirmation(booking: &Booking) -> PaymentConfirmed {
    PaymentConfirmed {
        booking_id: booking.id.clone(),
        lawyer_id: booking.lawyer_id.clone(),
        gross_amount: booking.gross_amount,
        commission: booking.platform_commission,
        lawyer_payout: booking.lawyer_payout,
        payment_reference: Some("MPESA_REF_1".to_string()),
    }
}

pub fn snapshot(balance: Decimal, pending: Decimal, available: Decimal) -> BalanceSnapshot {
    BalanceSnapshot::new(balance, pending, available)
}

pub fn mpesa() -> DestinationDetails {
    DestinationDetails::mobile_money("0712345678", "Jane Wanjiku")
}

pub fn bank() -> DestinationDetails {
    DestinationDetails::bank("Equity Bank", "0123456789", "Jane Wanjiku")
}

pub fn at(base: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    base + Duration::hours(hours)
}
