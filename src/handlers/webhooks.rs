//! Payment gateway webhook handler.

use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use serde::Serialize;

use crate::{services::reconciler, state::AppState};

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
}

/// Receive a payment notification.
///
/// # Endpoint
///
/// `POST /api/v1/payments/webhook`
///
/// # Request Body
///
/// Either a SePay IPN or a bank-feed transfer. The body is taken as raw bytes
/// so that malformed payloads, invalid UTF-8 included, are still stored for
/// audit.
///
/// # Response
///
/// - **200 OK** `{ "success": true }`: stored, whatever the business outcome
/// - **500** `{ "success": false }`: storage failed; the gateway should retry
pub async fn receive_payment_notification(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    let raw = String::from_utf8_lossy(&body);

    match reconciler::handle_notification(state.store.as_ref(), &state.config.payment, &raw).await
    {
        Ok(_) => (StatusCode::OK, Json(WebhookAck { success: true })),
        Err(e) if !e.is_storage_failure() => {
            tracing::warn!(error = %e, "Payment notification acknowledged with error");
            (StatusCode::OK, Json(WebhookAck { success: true }))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to process payment notification");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookAck { success: false }),
            )
        }
    }
}
