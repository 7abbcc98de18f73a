//! # Lexvault Persistence
//!
//! SQLite storage for the payment-custody ledger.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lexvault_persistence::{Database, WalletRepo};
//!
//! let db = Database::init("sqlite:data/lexvault.db", 5).await?;
//!
//! let mut tx = db.pool().begin().await?;
//! let wallet = WalletRepo::lock_by_lawyer(&mut *tx, "LAW_001").await?;
//! tx.commit().await?;
//!
//! db.close().await;
//! ```

pub mod error;
pub mod sqlite;

pub use error::{PersistenceError, PersistenceResult};
pub use sqlite::schema::{
    BookingRow, ClientRefundRow, WalletRow, WalletTransactionRow, WithdrawalRow,
};
pub use sqlite::{
    create_pool, init_database, run_migrations, BookingRepo, ClientRefundRepo, WalletRepo,
    WalletTransactionRepo, WithdrawalRepo,
};

use sqlx::SqlitePool;
use tracing::info;

/// Database facade owning the connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects without touching the schema.
    pub async fn connect(database_url: &str, max_connections: u32) -> PersistenceResult<Self> {
        let pool = create_pool(database_url, max_connections).await?;
        Ok(Self { pool })
    }

    /// Connects and runs pending migrations.
    pub async fn init(database_url: &str, max_connections: u32) -> PersistenceResult<Self> {
        let pool = init_database(database_url, max_connections).await?;
        info!(database_url, "database ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Waits for checked-out connections and closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("database pool closed");
    }
}
