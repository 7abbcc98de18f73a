//! Periodic auto-release sweep
//!
//! ```rust,ignore
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let sweeper = AutoReleaseSweeper::new(ctx.clone(), Duration::from_secs(3600));
//! let handle = sweeper.spawn(shutdown_rx);
//! // ...
//! shutdown_tx.send(true)?;
//! handle.await?;
//! ```

use crate::escrow::{EscrowService, SweepReport};
use crate::services::ServiceContext;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Last-run figures, served on `/health`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepSnapshot {
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_released: usize,
    pub last_failed: usize,
    pub total_released: u64,
    pub runs: u64,
}

#[derive(Debug, Default)]
pub struct SweepMetrics {
    inner: RwLock<SweepSnapshot>,
}

impl SweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SweepSnapshot {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record_success(&self, at: DateTime<Utc>, report: &SweepReport) {
        let mut m = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        m.runs += 1;
        m.last_run_at = Some(at);
        m.last_success_at = Some(at);
        m.last_released = report.released;
        m.last_failed = report.failures.len();
        m.total_released += report.released as u64;
    }

    fn record_error(&self, at: DateTime<Utc>) {
        let mut m = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        m.runs += 1;
        m.last_run_at = Some(at);
        m.last_released = 0;
    }
}

pub struct AutoReleaseSweeper {
    ctx: Arc<ServiceContext>,
    interval: Duration,
    metrics: Arc<SweepMetrics>,
}

impl AutoReleaseSweeper {
    pub fn new(ctx: Arc<ServiceContext>, interval: Duration) -> Self {
        Self {
            ctx,
            interval,
            metrics: Arc::new(SweepMetrics::new()),
        }
    }

    /// Shares an existing metrics handle, e.g. one already held by the API.
    pub fn with_metrics(mut self, metrics: Arc<SweepMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<SweepMetrics> {
        self.metrics.clone()
    }

    /// One pass. A pass that cannot even list bookings is recorded as a
    /// run without success.
    pub async fn run_once(&self) -> Option<SweepReport> {
        let started = Utc::now();
        match EscrowService::new(&self.ctx)
            .auto_release_expired_bookings_at(started)
            .await
        {
            Ok(report) => {
                self.metrics.record_success(started, &report);
                Some(report)
            }
            Err(e) => {
                error!(error = %e, "auto-release sweep failed");
                self.metrics.record_error(started);
                None
            }
        }
    }

    /// Sweeps on every tick until `shutdown` turns true or its sender is
    /// dropped. The first tick fires immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "auto-release sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("auto-release sweeper stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
