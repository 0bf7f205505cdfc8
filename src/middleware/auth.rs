//! Authentication middleware.
//!
//! Two kinds of callers reach this service:
//! 1. End users (and the AI proxy acting for them) with an access token issued
//!    by the auth service
//! 2. The payment gateway delivering webhooks with a shared API key
//!
//! Unauthenticated requests are rejected with HTTP 401 before any handler runs.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{error::AppError, state::AppState};

/// Header the gateway may use instead of `Authorization: Apikey <key>`.
pub const PAYMENT_API_KEY_HEADER: &str = "payment-api-key";

/// Authentication context attached to authenticated requests.
///
/// Inserted into the request's extension map; handlers extract it with
/// `Extension<AuthContext>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Wallet owner; every query is scoped to this id
    pub user_id: i64,
}

/// Claims of an access token issued by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    #[serde(rename = "userId")]
    pub user_id: i64,

    #[serde(rename = "deviceId", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<i64>,

    #[serde(rename = "roleName", default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,

    /// Expiry as a unix timestamp, checked by `jsonwebtoken`
    pub exp: usize,
}

/// Access token middleware.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>` header
/// 2. Verify the HS256 signature with `ACCESS_TOKEN_SECRET` and the expiry
/// 3. Inject `AuthContext` with the token's `userId`
///
/// # Returns
///
/// - `Ok(Response)` from the next handler if the token is valid
/// - `Err(AppError::Unauthorized)` otherwise (401)
pub async fn access_token_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let claims = verify_access_token(token, &state.config.access_token_secret)?;

    request.extensions_mut().insert(AuthContext {
        user_id: claims.user_id,
    });

    Ok(next.run(request).await)
}

/// Decode and validate an access token.
pub fn verify_access_token(token: &str, secret: &str) -> Result<AccessTokenClaims, AppError> {
    let validation = Validation::new(Algorithm::HS256);

    decode::<AccessTokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "Access token rejected");
        AppError::Unauthorized
    })
}

/// Payment gateway API-key middleware for the webhook route.
///
/// # Headers
///
/// Either of:
/// ```text
/// Authorization: Apikey <key>
/// payment-api-key: <key>
/// ```
///
/// When `PAYMENT_API_KEY` is not configured the check is skipped with a warning.
pub async fn payment_api_key_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.payment_api_key.as_deref() else {
        tracing::warn!("PAYMENT_API_KEY not set, accepting unauthenticated webhook");
        return Ok(next.run(request).await);
    };

    let presented = presented_api_key(request.headers()).ok_or(AppError::Unauthorized)?;

    // Compare fixed-length digests rather than the raw keys
    if Sha256::digest(presented.as_bytes()) != Sha256::digest(expected.as_bytes()) {
        tracing::warn!("Webhook rejected: invalid payment API key");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

fn presented_api_key(headers: &HeaderMap) -> Option<&str> {
    let from_authorization = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Apikey "));

    from_authorization.or_else(|| {
        headers
            .get(PAYMENT_API_KEY_HEADER)
            .and_then(|h| h.to_str().ok())
    })
}
