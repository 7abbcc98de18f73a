use crate::handlers;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/wallet", wallet_routes())
        .nest("/api/bookings", booking_routes())
        .nest("/api/payments/callbacks", callback_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn wallet_routes() -> Router<AppState> {
    Router::new()
        // lawyer
        .route("/balance", get(handlers::get_balance))
        .route("/transactions", get(handlers::list_transactions))
        .route("/withdraw", post(handlers::create_withdrawal))
        .route("/withdrawals", get(handlers::list_withdrawals))
        .route(
            "/withdrawals/:id",
            get(handlers::get_withdrawal).delete(handlers::cancel_withdrawal),
        )
        .route("/stats", get(handlers::get_stats))
        // admin
        .route("/admin/process/:id", post(handlers::process_withdrawal))
        .route("/admin/complete/:id", post(handlers::complete_withdrawal))
        .route("/admin/fail/:id", post(handlers::fail_withdrawal))
        .route("/admin/withdrawals", get(handlers::admin_list_withdrawals))
        .route("/admin/wallets/:lawyer_id/active", post(handlers::set_wallet_active))
        .route("/admin/wallets/:lawyer_id/reconcile", get(handlers::reconcile_wallet))
        .route("/admin/release/:booking_id", post(handlers::release_booking))
        .route("/admin/refunds", get(handlers::list_client_refunds))
}

fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/payment-confirmed", post(handlers::payment_confirmed))
        .route("/:booking_id", get(handlers::get_booking))
        .route("/:booking_id/session-completed", post(handlers::session_completed))
        .route("/:booking_id/cancel", post(handlers::cancel_booking))
}

fn callback_routes() -> Router<AppState> {
    Router::new()
        .route("/payout", post(handlers::payout_callback))
        .route("/settlement/:booking_id", post(handlers::settlement_callback))
}

