//! Repository implementations for SQLite
//!
//! Every function takes `&mut SqliteConnection`, so the same code runs on a
//! pooled connection or inside a transaction (`&mut *tx`). The `lock*`
//! functions bump the row version with `UPDATE ... RETURNING *`; called as
//! the first statement of a transaction they take SQLite's write lock
//! before anything is read.

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use chrono::{DateTime, Utc};
use lexvault_core::{
    Booking, TransactionStatus, TransactionType, Wallet, WalletTransaction, WithdrawalRequest,
    WithdrawalStatus,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

fn convert<R, T>(rows: Vec<R>) -> PersistenceResult<Vec<T>>
where
    T: TryFrom<R, Error = PersistenceError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ============================================================================
// Wallet Repository
// ============================================================================

pub struct WalletRepo;

impl WalletRepo {
    /// Creates the lawyer's wallet if missing. Returns true when created.
    pub async fn ensure(
        conn: &mut SqliteConnection,
        lawyer_id: &str,
        currency: &str,
        now: DateTime<Utc>,
    ) -> PersistenceResult<bool> {
        let wallet = Wallet::new(lawyer_id, currency, now);
        let result = sqlx::query(
            r#"
            INSERT INTO wallets (id, lawyer_id, balance, pending_balance, available_balance,
                                 currency, is_active, version, created_at, updated_at)
            VALUES (?, ?, '0', '0', '0', ?, 1, 0, ?, ?)
            ON CONFLICT (lawyer_id) DO NOTHING
            "#,
        )
        .bind(&wallet.id)
        .bind(&wallet.lawyer_id)
        .bind(&wallet.currency)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Write-locks and returns the lawyer's wallet.
    pub async fn lock_by_lawyer(
        conn: &mut SqliteConnection,
        lawyer_id: &str,
    ) -> PersistenceResult<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>(
            "UPDATE wallets SET version = version + 1 WHERE lawyer_id = ? RETURNING *",
        )
        .bind(lawyer_id)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(Wallet::try_from).transpose()
    }

    pub async fn get_by_lawyer(
        conn: &mut SqliteConnection,
        lawyer_id: &str,
    ) -> PersistenceResult<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE lawyer_id = ?")
            .bind(lawyer_id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(Wallet::try_from).transpose()
    }

    pub async fn list_all(conn: &mut SqliteConnection) -> PersistenceResult<Vec<Wallet>> {
        let rows = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets ORDER BY created_at, rowid")
            .fetch_all(&mut *conn)
            .await?;
        convert(rows)
    }

    /// Persists balances and the active flag.
    pub async fn save(conn: &mut SqliteConnection, wallet: &Wallet) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = ?, pending_balance = ?, available_balance = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(wallet.balance.to_string())
        .bind(wallet.pending_balance.to_string())
        .bind(wallet.available_balance.to_string())
        .bind(wallet.is_active)
        .bind(wallet.updated_at)
        .bind(&wallet.id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Wallet", &wallet.id));
        }
        Ok(())
    }

    pub async fn count(conn: &mut SqliteConnection) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wallets")
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Wallet Transaction Repository
// ============================================================================

pub struct WalletTransactionRepo;

impl WalletTransactionRepo {
    /// Appends an entry. A second escrow entry of the same kind for a
    /// booking fails with `UniqueViolation`.
    pub async fn insert(
        conn: &mut SqliteConnection,
        tx: &WalletTransaction,
    ) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (id, wallet_id, booking_id, tx_type, amount,
                                             balance_before, balance_after, status,
                                             description, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&tx.id)
        .bind(&tx.wallet_id)
        .bind(&tx.booking_id)
        .bind(tx.tx_type.as_str())
        .bind(tx.amount.to_string())
        .bind(tx.balance_before.to_string())
        .bind(tx.balance_after.to_string())
        .bind(tx.status.as_str())
        .bind(&tx.description)
        .bind(serde_json::to_string(&tx.metadata)?)
        .bind(tx.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn find_booking_entry(
        conn: &mut SqliteConnection,
        booking_id: &str,
        tx_type: TransactionType,
        status: TransactionStatus,
    ) -> PersistenceResult<Option<WalletTransaction>> {
        let row = sqlx::query_as::<_, WalletTransactionRow>(
            "SELECT * FROM wallet_transactions WHERE booking_id = ? AND tx_type = ? AND status = ?",
        )
        .bind(booking_id)
        .bind(tx_type.as_str())
        .bind(status.as_str())
        .fetch_optional(&mut *conn)
        .await?;
        row.map(WalletTransaction::try_from).transpose()
    }

    /// Full log of a wallet, oldest first.
    pub async fn list_by_wallet(
        conn: &mut SqliteConnection,
        wallet_id: &str,
    ) -> PersistenceResult<Vec<WalletTransaction>> {
        let rows = sqlx::query_as::<_, WalletTransactionRow>(
            "SELECT * FROM wallet_transactions WHERE wallet_id = ? ORDER BY created_at, rowid",
        )
        .bind(wallet_id)
        .fetch_all(&mut *conn)
        .await?;
        convert(rows)
    }

    /// PENDING payout entries not yet superseded by a release or a refund.
    pub async fn list_open_holds(
        conn: &mut SqliteConnection,
        wallet_id: &str,
    ) -> PersistenceResult<Vec<WalletTransaction>> {
        let rows = sqlx::query_as::<_, WalletTransactionRow>(
            r#"
            SELECT t.* FROM wallet_transactions t
            WHERE t.wallet_id = ? AND t.tx_type = 'PAYOUT' AND t.status = 'PENDING'
              AND NOT EXISTS (
                  SELECT 1 FROM wallet_transactions s
                  WHERE s.wallet_id = t.wallet_id
                    AND s.booking_id = t.booking_id
                    AND s.status = 'COMPLETED'
                    AND s.tx_type IN ('PAYOUT', 'REFUND')
              )
            ORDER BY t.created_at, t.rowid
            "#,
        )
        .bind(wallet_id)
        .fetch_all(&mut *conn)
        .await?;
        convert(rows)
    }

    pub async fn count(conn: &mut SqliteConnection) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wallet_transactions")
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Booking Repository
// ============================================================================

pub struct BookingRepo;

impl BookingRepo {
    pub async fn insert(conn: &mut SqliteConnection, booking: &Booking) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, client_id, lawyer_id, gross_amount, platform_commission,
                                  lawyer_payout, currency, client_payment_status, payout_status,
                                  status, scheduled_start_time, scheduled_end_time,
                                  payment_reference, payout_settled_at, cancelled_by,
                                  cancellation_reason, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&booking.id)
        .bind(&booking.client_id)
        .bind(&booking.lawyer_id)
        .bind(booking.gross_amount.to_string())
        .bind(booking.platform_commission.to_string())
        .bind(booking.lawyer_payout.to_string())
        .bind(&booking.currency)
        .bind(booking.client_payment_status.as_str())
        .bind(booking.payout_status.as_str())
        .bind(booking.status.as_str())
        .bind(booking.scheduled_start_time)
        .bind(booking.scheduled_end_time)
        .bind(&booking.payment_reference)
        .bind(booking.payout_settled_at)
        .bind(&booking.cancelled_by)
        .bind(&booking.cancellation_reason)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> PersistenceResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(Booking::try_from).transpose()
    }

    /// Write-locks and returns the booking.
    pub async fn lock(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(
            "UPDATE bookings SET version = version + 1 WHERE id = ? RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(Booking::try_from).transpose()
    }

    /// Persists the fields owned by the escrow ledger.
    pub async fn save(conn: &mut SqliteConnection, booking: &Booking) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET client_payment_status = ?, payout_status = ?, status = ?, payment_reference = ?,
                payout_settled_at = ?, cancelled_by = ?, cancellation_reason = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(booking.client_payment_status.as_str())
        .bind(booking.payout_status.as_str())
        .bind(booking.status.as_str())
        .bind(&booking.payment_reference)
        .bind(booking.payout_settled_at)
        .bind(&booking.cancelled_by)
        .bind(&booking.cancellation_reason)
        .bind(booking.updated_at)
        .bind(&booking.id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Booking", &booking.id));
        }
        Ok(())
    }

    /// Ids of bookings whose escrow is due for automatic release.
    pub async fn list_due_for_release(
        conn: &mut SqliteConnection,
        cutoff: DateTime<Utc>,
    ) -> PersistenceResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT id FROM bookings
            WHERE status = 'COMPLETED'
              AND payout_status = 'PENDING'
              AND client_payment_status = 'COMPLETED'
              AND scheduled_end_time <= ?
            ORDER BY scheduled_end_time, rowid
            "#,
        )
        .bind(cutoff)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn list_by_lawyer(
        conn: &mut SqliteConnection,
        lawyer_id: &str,
    ) -> PersistenceResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            "SELECT * FROM bookings WHERE lawyer_id = ? ORDER BY scheduled_start_time, rowid",
        )
        .bind(lawyer_id)
        .fetch_all(&mut *conn)
        .await?;
        convert(rows)
    }

    pub async fn count(conn: &mut SqliteConnection) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings")
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Withdrawal Repository
// ============================================================================

pub struct WithdrawalRepo;

impl WithdrawalRepo {
    /// Inserts a new request. A second in-flight request for the same
    /// lawyer fails with `UniqueViolation`.
    pub async fn insert(
        conn: &mut SqliteConnection,
        req: &WithdrawalRequest,
    ) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO withdrawal_requests (id, lawyer_id, amount, method, destination, status,
                                             requested_at, processed_at, completed_at,
                                             processed_by, rejection_reason, failure_reason,
                                             provider_transaction_id, version, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&req.id)
        .bind(&req.lawyer_id)
        .bind(req.amount.to_string())
        .bind(req.method.as_str())
        .bind(serde_json::to_string(&req.destination)?)
        .bind(req.status.as_str())
        .bind(req.requested_at)
        .bind(req.processed_at)
        .bind(req.completed_at)
        .bind(&req.processed_by)
        .bind(&req.rejection_reason)
        .bind(&req.failure_reason)
        .bind(&req.provider_transaction_id)
        .bind(req.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> PersistenceResult<Option<WithdrawalRequest>> {
        let row = sqlx::query_as::<_, WithdrawalRow>("SELECT * FROM withdrawal_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(WithdrawalRequest::try_from).transpose()
    }

    /// Write-locks and returns the request.
    pub async fn lock(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> PersistenceResult<Option<WithdrawalRequest>> {
        let row = sqlx::query_as::<_, WithdrawalRow>(
            "UPDATE withdrawal_requests SET version = version + 1 WHERE id = ? RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(WithdrawalRequest::try_from).transpose()
    }

    /// Persists status and audit fields.
    pub async fn save(conn: &mut SqliteConnection, req: &WithdrawalRequest) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET status = ?, processed_at = ?, completed_at = ?, processed_by = ?,
                rejection_reason = ?, failure_reason = ?, provider_transaction_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.status.as_str())
        .bind(req.processed_at)
        .bind(req.completed_at)
        .bind(&req.processed_by)
        .bind(&req.rejection_reason)
        .bind(&req.failure_reason)
        .bind(&req.provider_transaction_id)
        .bind(req.updated_at)
        .bind(&req.id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("WithdrawalRequest", &req.id));
        }
        Ok(())
    }

    pub async fn find_in_flight(
        conn: &mut SqliteConnection,
        lawyer_id: &str,
    ) -> PersistenceResult<Option<WithdrawalRequest>> {
        let row = sqlx::query_as::<_, WithdrawalRow>(
            r#"
            SELECT * FROM withdrawal_requests
            WHERE lawyer_id = ? AND status IN ('PENDING', 'APPROVED', 'PROCESSING')
            "#,
        )
        .bind(lawyer_id)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(WithdrawalRequest::try_from).transpose()
    }

    /// A lawyer's requests, newest first, optionally filtered by status.
    pub async fn list_by_lawyer(
        conn: &mut SqliteConnection,
        lawyer_id: &str,
        status: Option<WithdrawalStatus>,
    ) -> PersistenceResult<Vec<WithdrawalRequest>> {
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, WithdrawalRow>(
            r#"
            SELECT * FROM withdrawal_requests
            WHERE lawyer_id = ? AND (? IS NULL OR status = ?)
            ORDER BY requested_at DESC, rowid DESC
            "#,
        )
        .bind(lawyer_id)
        .bind(status)
        .bind(status)
        .fetch_all(&mut *conn)
        .await?;
        convert(rows)
    }

    /// All requests, oldest first, optionally filtered by status.
    pub async fn list_all(
        conn: &mut SqliteConnection,
        status: Option<WithdrawalStatus>,
    ) -> PersistenceResult<Vec<WithdrawalRequest>> {
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, WithdrawalRow>(
            r#"
            SELECT * FROM withdrawal_requests
            WHERE (? IS NULL OR status = ?)
            ORDER BY requested_at, rowid
            "#,
        )
        .bind(status)
        .bind(status)
        .fetch_all(&mut *conn)
        .await?;
        convert(rows)
    }

    pub async fn count_by_status(
        conn: &mut SqliteConnection,
    ) -> PersistenceResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM withdrawal_requests GROUP BY status ORDER BY status",
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }
}

// ============================================================================
// Client Refund Repository
// ============================================================================

pub struct ClientRefundRepo;

impl ClientRefundRepo {
    pub async fn insert(conn: &mut SqliteConnection, refund: &ClientRefundRow) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO client_refunds (id, booking_id, client_id, amount, refund_percent,
                                        currency, status, reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&refund.id)
        .bind(&refund.booking_id)
        .bind(&refund.client_id)
        .bind(&refund.amount)
        .bind(&refund.refund_percent)
        .bind(&refund.currency)
        .bind(&refund.status)
        .bind(&refund.reason)
        .bind(refund.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get_by_booking(
        conn: &mut SqliteConnection,
        booking_id: &str,
    ) -> PersistenceResult<Option<ClientRefundRow>> {
        let row = sqlx::query_as::<_, ClientRefundRow>(
            "SELECT * FROM client_refunds WHERE booking_id = ?",
        )
        .bind(booking_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }

    pub async fn list(
        conn: &mut SqliteConnection,
        status: Option<&str>,
    ) -> PersistenceResult<Vec<ClientRefundRow>> {
        let rows = sqlx::query_as::<_, ClientRefundRow>(
            r#"
            SELECT * FROM client_refunds
            WHERE (? IS NULL OR status = ?)
            ORDER BY created_at, rowid
            "#,
        )
        .bind(status)
        .bind(status)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }
}

// ============================================================================
// Database initialization
// ============================================================================

/// Opens a connection pool. The database file is created if missing.
pub async fn create_pool(database_url: &str, max_connections: u32) -> PersistenceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// Opens the pool and brings the schema up to date.
pub async fn init_database(database_url: &str, max_connections: u32) -> PersistenceResult<SqlitePool> {
    let pool = create_pool(database_url, max_connections).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use lexvault_core::{CommissionSplit, DestinationDetails, WithdrawalMethod};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}", dir.path().join("repos.db").display());
        let pool = init_database(&url, 2).await.unwrap();
        (dir, pool)
    }

    fn request(lawyer_id: &str) -> WithdrawalRequest {
        let dest = DestinationDetails::mobile_money("0712345678", "Jane")
            .validate_for(WithdrawalMethod::MobileMoney)
            .unwrap();
        WithdrawalRequest::new(lawyer_id, dec!(500), dest, Utc::now())
    }

    #[tokio::test]
    async fn test_wallet_ensure_is_idempotent() {
        let (_dir, pool) = setup().await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(WalletRepo::ensure(&mut conn, "LAW_1", "KES", Utc::now()).await.unwrap());
        assert!(!WalletRepo::ensure(&mut conn, "LAW_1", "KES", Utc::now()).await.unwrap());
        assert_eq!(WalletRepo::count(&mut conn).await.unwrap(), 1);

        let mut wallet = WalletRepo::lock_by_lawyer(&mut conn, "LAW_1")
            .await
            .unwrap()
            .unwrap();
        wallet.hold(dec!(1020.50)).unwrap();
        WalletRepo::save(&mut conn, &wallet).await.unwrap();

        let stored = WalletRepo::get_by_lawyer(&mut conn, "LAW_1").await.unwrap().unwrap();
        assert_eq!(stored.pending_balance, dec!(1020.50));
        assert!(WalletRepo::lock_by_lawyer(&mut conn, "NOBODY").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_escrow_entry_unique_per_booking() {
        let (_dir, pool) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        WalletRepo::ensure(&mut conn, "LAW_1", "KES", Utc::now()).await.unwrap();
        let wallet = WalletRepo::get_by_lawyer(&mut conn, "LAW_1").await.unwrap().unwrap();

        let hold = WalletTransaction::new(
            &wallet.id,
            TransactionType::Payout,
            TransactionStatus::Pending,
            dec!(100),
            dec!(0),
            dec!(0),
            Utc::now(),
        )
        .with_booking("BK_1");
        WalletTransactionRepo::insert(&mut conn, &hold).await.unwrap();

        let mut dup = hold.clone();
        dup.id = "WTX_other".to_string();
        let err = WalletTransactionRepo::insert(&mut conn, &dup).await.unwrap_err();
        assert!(err.is_unique_violation());

        let open = WalletTransactionRepo::list_open_holds(&mut conn, &wallet.id).await.unwrap();
        assert_eq!(open.len(), 1);

        let release = WalletTransaction::new(
            &wallet.id,
            TransactionType::Payout,
            TransactionStatus::Completed,
            dec!(100),
            dec!(0),
            dec!(100),
            Utc::now(),
        )
        .with_booking("BK_1");
        WalletTransactionRepo::insert(&mut conn, &release).await.unwrap();
        let open = WalletTransactionRepo::list_open_holds(&mut conn, &wallet.id).await.unwrap();
        assert!(open.is_empty());
    }

    #[tokio::test]
    async fn test_wallet_transactions_are_append_only() {
        let (_dir, pool) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        WalletRepo::ensure(&mut conn, "LAW_1", "KES", Utc::now()).await.unwrap();
        let wallet = WalletRepo::get_by_lawyer(&mut conn, "LAW_1").await.unwrap().unwrap();
        let entry = WalletTransaction::new(
            &wallet.id,
            TransactionType::Payout,
            TransactionStatus::Pending,
            dec!(100),
            dec!(0),
            dec!(0),
            Utc::now(),
        );
        WalletTransactionRepo::insert(&mut conn, &entry).await.unwrap();

        let update = sqlx::query("UPDATE wallet_transactions SET amount = '1' WHERE id = ?")
            .bind(&entry.id)
            .execute(&mut *conn)
            .await;
        assert!(update.is_err());
        let delete = sqlx::query("DELETE FROM wallet_transactions")
            .execute(&mut *conn)
            .await;
        assert!(delete.is_err());
    }

    #[tokio::test]
    async fn test_one_in_flight_withdrawal_per_lawyer() {
        let (_dir, pool) = setup().await;
        let mut conn = pool.acquire().await.unwrap();

        let mut first = request("LAW_1");
        WithdrawalRepo::insert(&mut conn, &first).await.unwrap();

        let err = WithdrawalRepo::insert(&mut conn, &request("LAW_1")).await.unwrap_err();
        assert!(err.is_unique_violation());
        WithdrawalRepo::insert(&mut conn, &request("LAW_2")).await.unwrap();

        first.cancel(Utc::now()).unwrap();
        WithdrawalRepo::save(&mut conn, &first).await.unwrap();
        WithdrawalRepo::insert(&mut conn, &request("LAW_1")).await.unwrap();

        let cancelled = WithdrawalRepo::list_by_lawyer(
            &mut conn,
            "LAW_1",
            Some(WithdrawalStatus::Cancelled),
        )
        .await
        .unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, first.id);

        let all = WithdrawalRepo::list_all(&mut conn, None).await.unwrap();
        assert_eq!(all.len(), 3);
        let stored = WithdrawalRepo::get_by_id(&mut conn, &first.id).await.unwrap().unwrap();
        assert_eq!(stored.destination, first.destination);
    }

    #[tokio::test]
    async fn test_due_for_release_query() {
        let (_dir, pool) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let now = Utc::now();
        let split = CommissionSplit::from_rate(dec!(1000), dec!(0.1)).unwrap();

        let mut due = Booking::new(
            "C1",
            "L1",
            split,
            "KES",
            now - ChronoDuration::hours(30),
            now - ChronoDuration::hours(29),
            now,
        )
        .unwrap();
        due.status = lexvault_core::BookingStatus::Completed;
        due.client_payment_status = lexvault_core::ClientPaymentStatus::Completed;
        BookingRepo::insert(&mut conn, &due).await.unwrap();

        let mut recent = due.clone();
        recent.id = "BK_recent".to_string();
        recent.scheduled_start_time = now - ChronoDuration::hours(2);
        recent.scheduled_end_time = now - ChronoDuration::hours(1);
        BookingRepo::insert(&mut conn, &recent).await.unwrap();

        let ids = BookingRepo::list_due_for_release(&mut conn, now - ChronoDuration::hours(24))
            .await
            .unwrap();
        assert_eq!(ids, vec![due.id.clone()]);

        let locked = BookingRepo::lock(&mut conn, &due.id).await.unwrap().unwrap();
        assert_eq!(locked.lawyer_payout, dec!(900));
    }
}
