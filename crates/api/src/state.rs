use lexvault_business::{ServiceContext, SweepMetrics};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<ServiceContext>,
    pub sweep_metrics: Arc<SweepMetrics>,
}

impl AppState {
    pub fn new(ctx: Arc<ServiceContext>, sweep_metrics: Arc<SweepMetrics>) -> Self {
        Self { ctx, sweep_metrics }
    }
}
