//! Router configuration.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{health, payments, wallet, webhooks};
use crate::middleware::auth;
use crate::state::AppState;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health`
///
/// ## Gateway (payment API key)
/// - `POST /api/v1/payments/webhook`
///
/// ## User (Bearer access token)
/// - `POST /api/v1/payments`, `GET /api/v1/payments`
/// - `GET /api/v1/payments/{id}`, `POST /api/v1/payments/{id}/cancel`
/// - `GET /api/v1/wallet/balance`
/// - `GET /api/v1/wallet/credit-history`, `GET /api/v1/wallet/topup-history`
/// - `POST /api/v1/wallet/estimate-cost`, `POST /api/v1/wallet/deduct`
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origin_list());

    let user_routes = Router::new()
        .route(
            "/api/v1/payments",
            post(payments::create_payment).get(payments::list_payments),
        )
        .route("/api/v1/payments/{id}", get(payments::get_payment))
        .route(
            "/api/v1/payments/{id}/cancel",
            post(payments::cancel_payment),
        )
        .route("/api/v1/wallet/balance", get(wallet::get_balance))
        .route("/api/v1/wallet/credit-history", get(wallet::credit_history))
        .route("/api/v1/wallet/topup-history", get(wallet::top_up_history))
        .route("/api/v1/wallet/estimate-cost", post(wallet::estimate_cost))
        .route("/api/v1/wallet/deduct", post(wallet::deduct))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::access_token_middleware,
        ));

    let gateway_routes = Router::new()
        .route(
            "/api/v1/payments/webhook",
            post(webhooks::receive_payment_notification),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::payment_api_key_middleware,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(gateway_routes)
        .merge(user_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}
