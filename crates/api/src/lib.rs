//! # Lexvault API
//!
//! HTTP surface over the business services.
//!
//! | Prefix | Caller |
//! |---|---|
//! | `/api/wallet` | lawyer (`/admin/*` admin) |
//! | `/api/bookings` | marketplace (system) or admin |
//! | `/api/payments/callbacks` | payment provider |
//! | `/health` | anyone |
//!
//! Every JSON response uses the [`ApiResponse`] envelope.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use extract::{Caller, Role};
pub use handlers::ApiResponse;
pub use routes::router;
pub use state::AppState;

use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

/// Serves the API until `shutdown` resolves, then drains in-flight requests.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "lexvault API listening");
    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}
