//! Database initialization and status

use anyhow::{Context, Result};
use lexvault_business::ServiceContext;
use lexvault_config::LexvaultConfig;
use lexvault_persistence::{
    init_database, BookingRepo, Database, WalletRepo, WalletTransactionRepo, WithdrawalRepo,
};
use std::path::{Path, PathBuf};

/// File behind a `sqlite:` URL, if it names one
fn database_file(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("sqlite:")?;
    let rest = rest.trim_start_matches("//");
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Create the database (or recreate it with `force`) and run migrations
pub async fn init(config: &LexvaultConfig, force: bool) -> Result<()> {
    if let Some(path) = database_file(&config.database.url) {
        if force && path.exists() {
            std::fs::remove_file(&path).context("Failed to remove existing database")?;
            println!("🗑️  Removed existing database");
        }
        ensure_parent_dir(&path)?;
    }

    let db = Database::init(&config.database.url, 1)
        .await
        .context("Failed to initialize database")?;
    db.close().await;
    Ok(())
}

/// Open the pool, apply pending migrations and build the service context
pub async fn connect(config: &LexvaultConfig) -> Result<ServiceContext> {
    if let Some(path) = database_file(&config.database.url) {
        ensure_parent_dir(&path)?;
    }
    let pool = init_database(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to database. Run 'lexvault init' first.")?;
    ServiceContext::from_config(pool, config).context("Failed to configure payout gateway")
}

/// Show database status
pub async fn show_status(config: &LexvaultConfig) -> Result<()> {
    if let Some(path) = database_file(&config.database.url) {
        if !path.exists() {
            println!("❌ Database not found at {}", path.display());
            println!("   Run 'lexvault init' to create the database");
            return Ok(());
        }
    }

    let db = Database::connect(&config.database.url, 1).await?;
    let mut conn = db.pool().acquire().await?;

    let wallets = WalletRepo::count(&mut conn).await?;
    let entries = WalletTransactionRepo::count(&mut conn).await?;
    let bookings = BookingRepo::count(&mut conn).await?;
    let queue = WithdrawalRepo::count_by_status(&mut conn).await?;

    println!("📊 Database Status");
    println!("   URL:      {}", config.database.url);
    println!("   Gateway:  {:?}", config.payout.gateway);
    println!();
    println!("   Wallets:       {}", wallets);
    println!("   Ledger rows:   {}", entries);
    println!("   Bookings:      {}", bookings);
    if queue.is_empty() {
        println!("   Withdrawals:   0");
    } else {
        println!("   Withdrawals:");
        for (status, count) in queue {
            println!("     {:<12} {}", status, count);
        }
    }

    drop(conn);
    db.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_file() {
        assert_eq!(database_file("sqlite:data/lexvault.db"), Some(PathBuf::from("data/lexvault.db")));
        assert_eq!(
            database_file("sqlite:///tmp/lv.db?mode=rwc"),
            Some(PathBuf::from("/tmp/lv.db"))
        );
        assert_eq!(database_file("sqlite::memory:"), None);
        assert_eq!(database_file("postgres://x"), None);
    }
}
