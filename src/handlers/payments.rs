//! Payment intent HTTP handlers.
//!
//! This module implements the payment endpoints:
//! - POST /api/v1/payments - Create a payment intent
//! - GET /api/v1/payments - List the user's payments
//! - GET /api/v1/payments/{id} - Get one payment
//! - POST /api/v1/payments/{id}/cancel - Cancel a pending payment

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        Page, Paginated,
        payment::{CreatePaymentRequest, ListPaymentsQuery, PaymentIntentResponse, PaymentResponse},
    },
    services::payment_service,
    state::AppState,
};

/// Create a payment intent.
///
/// # Endpoint
///
/// `POST /api/v1/payments`
///
/// # Request Body
///
/// ```json
/// { "amount": 50000, "gateway": "vietqr", "idempotency_key": "topup-001" }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the pending payment plus checkout instructions
/// - **Error (400)**: amount outside the allowed range
/// - **Error (409)**: idempotency key already used by a pending payment
///
/// ```json
/// {
///   "payment": { "id": 42, "reference": "NAPTIEN42", "amount": 50000, "status": "PENDING", ... },
///   "instructions": { "type": "bank_transfer", "qr_url": "https://img.vietqr.io/...", ... }
/// }
/// ```
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentIntentResponse>), AppError> {
    let intent =
        payment_service::create_payment(state.store.as_ref(), &state.config, auth.user_id, request)
            .await?;

    Ok((StatusCode::CREATED, Json(intent)))
}

/// List the user's payments, newest first.
///
/// # Query Parameters
///
/// - `page` (default 1), `limit` (default 20, max 100)
/// - `status`: `PENDING`, `SUCCESS`, `FAILED` or `CANCELLED`
pub async fn list_payments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Paginated<PaymentResponse>>, AppError> {
    let page = Page::new(query.page, query.limit);
    let prefix = &state.config.payment.reference_prefix;

    let payments =
        payment_service::list_payments(state.store.as_ref(), auth.user_id, query.status, page)
            .await?;

    Ok(Json(
        payments.map(|payment| PaymentResponse::from_payment(payment, prefix)),
    ))
}

/// Get one payment.
///
/// # Security Note
///
/// Returns 404 for payments owned by someone else.
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(payment_id): Path<i64>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment =
        payment_service::get_payment(state.store.as_ref(), auth.user_id, payment_id).await?;

    Ok(Json(PaymentResponse::from_payment(
        payment,
        &state.config.payment.reference_prefix,
    )))
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub message: String,
}

/// Cancel a pending payment.
///
/// # Response
///
/// - **Success (200 OK)**: `{ "message": "Payment cancelled" }`
/// - **Error (404)**: not found or not owned
/// - **Error (409)**: payment is no longer pending
pub async fn cancel_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(payment_id): Path<i64>,
) -> Result<Json<CancelResponse>, AppError> {
    payment_service::cancel_payment(state.store.as_ref(), auth.user_id, payment_id).await?;

    Ok(Json(CancelResponse {
        message: "Payment cancelled".to_string(),
    }))
}
