//! HTTP surface — Axum router and server.
//!
//! The storefront and the payment processor both talk to this router.
//! CORS is open for the static storefront; admin authentication sits in
//! front of this service and is not handled here.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

pub use routes::AppState;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // Public API
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/api/games", get(routes::list_games))
        .route("/api/results", get(routes::list_results))
        .route("/api/bets", post(routes::create_bet))
        .route("/api/webhooks/payments", post(routes::payment_webhook))
        .route("/api/punters/:pix_key/bets", get(routes::punter_bets))
        // Admin operations
        .route("/api/admin/games", post(routes::create_game))
        .route("/api/admin/games/:id/close", post(routes::close_game))
        .route("/api/admin/games/:id/finalize", post(routes::finalize_game))
        .route("/api/admin/games/:id/odds", put(routes::edit_odds))
        .route(
            "/api/admin/punters/:pix_key/mark-paid",
            post(routes::mark_paid),
        )
        .route("/api/admin/report", get(routes::admin_report))
        .route("/api/admin/history", delete(routes::clear_history))
        .layer(cors)
        .with_state(state)
}

/// Serve the API until Ctrl+C.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!(port, "API server listening on http://localhost:{port}");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received.");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
