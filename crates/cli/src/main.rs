//! Lexvault CLI - run the custody service and operate the ledger
//!
//! Usage:
//! ```bash
//! lexvault init
//! lexvault serve --listen 0.0.0.0:8080
//! lexvault booking seed LAW_001 --gross 5000 --paid
//! lexvault wallet balance LAW_001
//! lexvault admin approve WDR_...
//! lexvault sweep
//! lexvault report withdrawals --format csv --output withdrawals.csv
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lexvault_config::{ConfigLoader, LexvaultConfig};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod db;

use commands::{admin, ledger, report};

/// Lexvault - escrow and payout custody for lawyer consultations
#[derive(Parser)]
#[command(name = "lexvault")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides `database.url`
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and apply migrations
    Init {
        /// Delete an existing database file first
        #[arg(long)]
        force: bool,
    },

    /// Show row counts and withdrawal queue depth
    Status,

    /// Run the HTTP API and the auto-release sweeper
    Serve {
        /// Overrides `server.listen`
        #[arg(long)]
        listen: Option<SocketAddr>,
        /// Do not start the background sweeper
        #[arg(long)]
        no_sweeper: bool,
    },

    /// Release every booking past its grace period, once
    Sweep,

    /// Lawyer wallet queries
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },

    /// Booking lifecycle
    Booking {
        #[command(subcommand)]
        action: BookingAction,
    },

    /// Administrative operations
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },

    /// Generate reports
    Report {
        /// Report type
        kind: ReportType,
        /// Restrict to one lawyer (required for `ledger`)
        #[arg(long)]
        lawyer: Option<String>,
        /// Report format
        #[arg(long, default_value = "markdown")]
        format: FormatArg,
        /// Output file path
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum WalletAction {
    /// Balance, escrow and available funds
    Balance { lawyer_id: String },
    /// Wallet log, newest first
    Transactions { lawyer_id: String },
    /// Withdrawal requests
    Withdrawals {
        lawyer_id: String,
        /// Filter by status (e.g. pending, completed)
        #[arg(long)]
        status: Option<String>,
    },
    /// Withdrawal totals and success rate
    Stats { lawyer_id: String },
}

#[derive(Subcommand)]
pub enum BookingAction {
    /// Register a booking, optionally with its payment already confirmed
    Seed {
        lawyer_id: String,
        /// Amount the client pays
        #[arg(long)]
        gross: Decimal,
        #[arg(long, default_value = "CLI_DEMO")]
        client: String,
        /// Hours from now until the session starts (negative for the past)
        #[arg(long, default_value_t = 48, allow_hyphen_values = true)]
        starts_in: i64,
        #[arg(long, default_value_t = 1)]
        duration: i64,
        /// Confirm the client payment and hold the payout in escrow
        #[arg(long)]
        paid: bool,
    },
    /// Show a booking
    Show { booking_id: String },
    /// List a lawyer's bookings
    List { lawyer_id: String },
    /// Mark the session completed
    Complete { booking_id: String },
    /// Release the held payout to the lawyer
    Release {
        booking_id: String,
        #[arg(long, default_value = "Released from CLI")]
        reason: String,
    },
    /// Cancel and refund according to the refund policy
    Cancel {
        booking_id: String,
        #[arg(long)]
        reason: String,
        #[arg(long, default_value = "admin")]
        by: String,
    },
}

#[derive(Subcommand)]
pub enum AdminAction {
    /// Approve a pending withdrawal and dispatch the payout
    Approve {
        request_id: String,
        #[arg(long, default_value = "cli-admin")]
        admin: String,
    },
    /// Reject a pending withdrawal
    Reject {
        request_id: String,
        #[arg(long)]
        reason: String,
        #[arg(long, default_value = "cli-admin")]
        admin: String,
    },
    /// Confirm a processing payout (manual bank transfers)
    Complete {
        request_id: String,
        /// Provider or bank reference
        #[arg(long)]
        reference: String,
    },
    /// Mark an approved or processing payout as failed
    Fail {
        request_id: String,
        #[arg(long)]
        reason: String,
    },
    /// Withdrawal queue across all lawyers
    Queue {
        #[arg(long)]
        status: Option<String>,
    },
    /// Block holds, releases and withdrawals for a wallet
    Freeze { lawyer_id: String },
    /// Re-activate a frozen wallet
    Unfreeze { lawyer_id: String },
    /// Client refunds waiting to be paid out
    Refunds {
        #[arg(long)]
        status: Option<String>,
    },
    /// Compare stored balances with the wallet log
    Reconcile {
        /// One lawyer; all wallets when omitted
        lawyer_id: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ReportType {
    Ledger,
    Withdrawals,
    Reconciliation,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Csv,
    Json,
    Markdown,
}

impl FormatArg {
    pub fn to_report_format(self) -> lexvault_reports::ReportFormat {
        match self {
            FormatArg::Csv => lexvault_reports::ReportFormat::Csv,
            FormatArg::Json => lexvault_reports::ReportFormat::Json,
            FormatArg::Markdown => lexvault_reports::ReportFormat::Markdown,
        }
    }
}

fn load_config(cli: &Cli) -> Result<LexvaultConfig> {
    let loader = ConfigLoader::load_or_default(cli.config.as_deref())
        .and_then(ConfigLoader::with_env_overrides)
        .context("Failed to load configuration")?;
    let mut config = loader.into_config();
    if let Some(url) = &cli.database_url {
        config.database.url = url.clone();
    }
    Ok(config)
}

fn init_tracing(config: &LexvaultConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config);

    match cli.command {
        Commands::Init { force } => {
            db::init(&config, force).await?;
            println!("✅ Database initialized at {}", config.database.url);
        }

        Commands::Status => {
            db::show_status(&config).await?;
        }

        Commands::Serve { listen, no_sweeper } => {
            admin::serve(&config, listen, no_sweeper).await?;
        }

        Commands::Sweep => {
            admin::sweep(&config).await?;
        }

        Commands::Wallet { action } => {
            ledger::wallet(&config, action).await?;
        }

        Commands::Booking { action } => {
            ledger::booking(&config, action).await?;
        }

        Commands::Admin { action } => {
            admin::handle(&config, action).await?;
        }

        Commands::Report {
            kind,
            lawyer,
            format,
            output,
        } => {
            report::generate(&config, kind, lawyer, format, output).await?;
        }
    }

    Ok(())
}
