//! Wallet HTTP handlers.
//!
//! - GET /api/v1/wallet/balance
//! - GET /api/v1/wallet/credit-history
//! - GET /api/v1/wallet/topup-history
//! - POST /api/v1/wallet/estimate-cost
//! - POST /api/v1/wallet/deduct

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        PageQuery, Paginated,
        wallet::{
            ActionRequest, CreditLogResponse, DeductRequest, DeductionResult, EstimateResponse,
            TopUpResponse, WalletResponse,
        },
    },
    services::credit_service,
    state::AppState,
};

/// Current balance. Creates an empty wallet on first access.
///
/// # Response (200 OK)
///
/// ```json
/// { "balance": 45000, "total_top_up": 50000, "total_spent": 5000 }
/// ```
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<WalletResponse>, AppError> {
    let wallet = credit_service::get_balance(state.store.as_ref(), auth.user_id).await?;
    Ok(Json(wallet.into()))
}

pub async fn credit_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<CreditLogResponse>>, AppError> {
    let logs =
        credit_service::credit_history(state.store.as_ref(), auth.user_id, query.into()).await?;
    Ok(Json(logs.map(CreditLogResponse::from)))
}

pub async fn top_up_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<TopUpResponse>>, AppError> {
    let top_ups =
        credit_service::top_up_history(state.store.as_ref(), auth.user_id, query.into()).await?;
    Ok(Json(top_ups.map(TopUpResponse::from)))
}

/// Price an action and check it against the balance. Read-only.
///
/// # Request Body
///
/// ```json
/// { "action": "generate-images", "image_count": 2, "use_pro": true, "resolution": "4K" }
/// ```
///
/// # Response (200 OK)
///
/// ```json
/// { "estimated_cost": 24000, "current_balance": 50000, "can_afford": true }
/// ```
pub async fn estimate_cost(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<EstimateResponse>, AppError> {
    let priced = credit_service::parse_action(&request)?;
    let quote = credit_service::quote(state.store.as_ref(), auth.user_id, &priced).await?;
    Ok(Json(quote))
}

/// Deduct the cost of an action before it runs.
///
/// # Response
///
/// - **Success (200 OK)**: `{ "amount_deducted": 10000, "new_balance": 40000 }`
/// - **Error (400)**: unknown action or bad image count
/// - **Error (404)**: the user has no wallet yet
/// - **Error (422)**: insufficient balance
pub async fn deduct(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<DeductRequest>,
) -> Result<Json<DeductionResult>, AppError> {
    let priced = credit_service::parse_action(&request.action)?;
    let request_id = request
        .request_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let result = credit_service::deduct_credit(
        state.store.as_ref(),
        auth.user_id,
        &priced,
        request.description,
        Some(request_id),
    )
    .await?;

    Ok(Json(result))
}
