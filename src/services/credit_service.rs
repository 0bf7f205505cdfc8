//! Credit service - spending the wallet balance.
//!
//! This service handles:
//! - Cost estimation (pure, no I/O)
//! - Deduction ahead of a priced action
//! - Balance and history queries
//!
//! # Deduction Contract
//!
//! A deduction is a pre-authorization: callers must wait for it to succeed
//! before running the priced action. If the action fails afterwards, refunding
//! is a separate operation.

use crate::error::AppError;
use crate::models::wallet::{
    ActionRequest, CreditLog, DeductionResult, EstimateResponse, NewDebit, PricedAction, TopUp,
    Wallet,
};
use crate::models::{Page, Paginated};
use crate::pricing::{self, ActionKind};
use crate::store::LedgerStore;

/// Upper bound on images per request; keeps `cost` far from overflow.
pub const MAX_IMAGE_COUNT: u32 = 100;

/// Validate raw action parameters.
///
/// # Errors
///
/// - `InvalidRequest`: unknown action name, or image count outside 1..=100
pub fn parse_action(request: &ActionRequest) -> Result<PricedAction, AppError> {
    let action: ActionKind = request
        .action
        .parse()
        .map_err(|e: pricing::UnknownAction| AppError::InvalidRequest(e.to_string()))?;

    if request.image_count == 0 || request.image_count > MAX_IMAGE_COUNT {
        return Err(AppError::InvalidRequest(format!(
            "image_count must be between 1 and {MAX_IMAGE_COUNT}"
        )));
    }

    Ok(PricedAction {
        action,
        image_count: request.image_count,
        use_pro: request.use_pro,
        resolution: request.resolution,
    })
}

/// Cost of a priced action. Pure function over the price list.
pub fn estimate_cost(priced: &PricedAction) -> i64 {
    pricing::estimate_cost(
        priced.action,
        priced.image_count,
        priced.use_pro,
        priced.resolution,
    )
}

/// Estimate plus whether the current balance covers it.
///
/// Read-only: a user without a wallet is reported with a zero balance and no
/// wallet is created.
pub async fn quote(
    store: &dyn LedgerStore,
    user_id: i64,
    priced: &PricedAction,
) -> Result<EstimateResponse, AppError> {
    let estimated_cost = estimate_cost(priced);
    let current_balance = store
        .find_wallet(user_id)
        .await?
        .map(|wallet| wallet.balance)
        .unwrap_or(0);

    Ok(EstimateResponse {
        estimated_cost,
        current_balance,
        can_afford: current_balance >= estimated_cost,
    })
}

/// Deduct the cost of an action from the user's wallet.
///
/// # Process
///
/// 1. Price the action; free actions return immediately without touching the wallet
/// 2. Lock the wallet and check the balance
/// 3. Decrement balance, increment total spent, append a `-cost` credit log
/// 4. Commit (or rollback on error)
///
/// # Errors
///
/// - `WalletNotFound`: the user has never topped up
/// - `InsufficientFunds`: balance below the cost
/// - `Database`: storage error occurred
pub async fn deduct_credit(
    store: &dyn LedgerStore,
    user_id: i64,
    priced: &PricedAction,
    description: Option<String>,
    request_id: Option<String>,
) -> Result<DeductionResult, AppError> {
    let cost = estimate_cost(priced);

    if cost == 0 {
        let new_balance = store
            .find_wallet(user_id)
            .await?
            .map(|wallet| wallet.balance)
            .unwrap_or(0);
        return Ok(DeductionResult {
            amount_deducted: 0,
            new_balance,
        });
    }

    let description = description.unwrap_or_else(|| default_description(priced));

    let (wallet, log) = store
        .debit_wallet(NewDebit {
            user_id,
            cost,
            action: priced.action.as_str().to_string(),
            description: Some(description),
            request_id,
        })
        .await
        .inspect_err(|e| {
            tracing::info!(user_id, action = %priced.action, cost, error = %e, "Deduction refused");
        })?;

    tracing::info!(
        user_id,
        action = %priced.action,
        cost,
        new_balance = wallet.balance,
        credit_log_id = log.id,
        "Credit deducted"
    );

    Ok(DeductionResult {
        amount_deducted: cost,
        new_balance: wallet.balance,
    })
}

/// `"generate-images - 2 image(s) (Pro)"`
fn default_description(priced: &PricedAction) -> String {
    format!(
        "{} - {} image(s){}",
        priced.action,
        priced.image_count,
        if priced.use_pro { " (Pro)" } else { "" }
    )
}

/// Current wallet, created with a zero balance on first access.
pub async fn get_balance(store: &dyn LedgerStore, user_id: i64) -> Result<Wallet, AppError> {
    Ok(store.get_or_create_wallet(user_id).await?)
}

pub async fn credit_history(
    store: &dyn LedgerStore,
    user_id: i64,
    page: Page,
) -> Result<Paginated<CreditLog>, AppError> {
    Ok(store.list_credit_logs(user_id, page).await?)
}

pub async fn top_up_history(
    store: &dyn LedgerStore,
    user_id: i64,
    page: Page,
) -> Result<Paginated<TopUp>, AppError> {
    Ok(store.list_top_ups(user_id, page).await?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::payment::{Gateway, NewPayment};
    use crate::pricing::Resolution;
    use crate::store::{MemoryStore, Settlement};

    fn priced(action: ActionKind, image_count: u32, use_pro: bool) -> PricedAction {
        PricedAction {
            action,
            image_count,
            use_pro,
            resolution: Resolution::Standard,
        }
    }

    /// Credit `amount` to a user the way reconciliation does.
    async fn fund(store: &MemoryStore, user_id: i64, amount: i64) {
        let payment = store
            .insert_payment(NewPayment {
                user_id,
                amount,
                gateway: Gateway::VietQr,
                description: None,
                idempotency_key: None,
            })
            .await
            .unwrap();
        store
            .settle_payment(Settlement {
                payment_id: payment.id,
                amount,
                gateway: "test".to_string(),
                transaction_id: None,
                metadata: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deducts_cost_and_logs_negative_amount() {
        let store = MemoryStore::new();
        fund(&store, 1, 50_000).await;

        let result = deduct_credit(
            &store,
            1,
            &priced(ActionKind::GenerateImages, 2, false),
            None,
            Some("req-1".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(result.amount_deducted, 10_000);
        assert_eq!(result.new_balance, 40_000);

        let logs = store.credit_logs(1);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].amount, -10_000);
        assert_eq!(logs[0].action, "generate-images");
        assert_eq!(
            logs[0].description.as_deref(),
            Some("generate-images - 2 image(s)")
        );
        assert_eq!(logs[0].request_id.as_deref(), Some("req-1"));

        let wallet = store.find_wallet(1).await.unwrap().unwrap();
        assert_eq!(wallet.total_spent, 10_000);
        assert_eq!(wallet.balance, wallet.total_top_up - wallet.total_spent);
    }

    #[tokio::test]
    async fn free_action_skips_the_wallet() {
        let store = MemoryStore::new();

        let result = deduct_credit(
            &store,
            7,
            &priced(ActionKind::AnalyzeFloorplan, 5, true),
            None,
            None,
        )
        .await
        .unwrap();

        assert_eq!(result, DeductionResult { amount_deducted: 0, new_balance: 0 });
        assert!(store.find_wallet(7).await.unwrap().is_none());
        assert!(store.credit_logs(7).is_empty());
    }

    #[tokio::test]
    async fn missing_wallet_is_reported() {
        let store = MemoryStore::new();

        let err = deduct_credit(&store, 3, &priced(ActionKind::Upscale, 1, false), None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::WalletNotFound));
    }

    #[tokio::test]
    async fn insufficient_balance_leaves_wallet_untouched() {
        let store = MemoryStore::new();
        fund(&store, 1, 10_000).await;

        let first = deduct_credit(
            &store,
            1,
            &priced(ActionKind::GenerateImages, 1, true),
            None,
            None,
        )
        .await
        .unwrap();
        assert_eq!(first.amount_deducted, 7_000);

        let err = deduct_credit(
            &store,
            1,
            &PricedAction {
                resolution: Resolution::High,
                ..priced(ActionKind::GenerateImages, 1, true)
            },
            None,
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            AppError::InsufficientFunds { required: 12_000, available: 3_000 }
        ));
        let wallet = store.find_wallet(1).await.unwrap().unwrap();
        assert_eq!(wallet.balance, 3_000);
        assert_eq!(store.credit_logs(1).len(), 1);
    }

    #[tokio::test]
    async fn concurrent_deductions_never_overdraw() {
        let store = Arc::new(MemoryStore::new());
        fund(&store, 1, 10_000).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                deduct_credit(
                    store.as_ref(),
                    1,
                    &priced(ActionKind::GenerateImages, 2, false),
                    None,
                    None,
                )
                .await
            }));
        }

        let mut successes = 0;
        let mut refusals = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AppError::InsufficientFunds { .. }) => refusals += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(refusals, 7);
        let wallet = store.find_wallet(1).await.unwrap().unwrap();
        assert_eq!(wallet.balance, 0);
        assert_eq!(wallet.total_spent, 10_000);
    }

    #[tokio::test]
    async fn quote_does_not_create_a_wallet() {
        let store = MemoryStore::new();

        let quote = quote(&store, 9, &priced(ActionKind::GenerateVideo, 1, false))
            .await
            .unwrap();

        assert_eq!(quote.estimated_cost, 8_000);
        assert_eq!(quote.current_balance, 0);
        assert!(!quote.can_afford);
        assert!(store.find_wallet(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_balance_creates_empty_wallet() {
        let store = MemoryStore::new();

        let wallet = get_balance(&store, 4).await.unwrap();

        assert_eq!(wallet.balance, 0);
        assert!(store.find_wallet(4).await.unwrap().is_some());
    }

    #[test]
    fn parse_action_validates_input() {
        let request = ActionRequest {
            action: "generate-images".to_string(),
            image_count: 2,
            use_pro: false,
            resolution: Resolution::Standard,
        };
        assert_eq!(
            parse_action(&request).unwrap(),
            priced(ActionKind::GenerateImages, 2, false)
        );

        let unknown = ActionRequest {
            action: "make-coffee".to_string(),
            ..request.clone()
        };
        assert!(matches!(parse_action(&unknown), Err(AppError::InvalidRequest(_))));

        let zero = ActionRequest {
            image_count: 0,
            ..request
        };
        assert!(matches!(parse_action(&zero), Err(AppError::InvalidRequest(_))));
    }
}
