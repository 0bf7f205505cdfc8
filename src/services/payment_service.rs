//! Payment intent service - creating, reading and cancelling payments.
//!
//! A payment is the record of a top-up the user intends to make. It stays
//! `PENDING` until the reconciler matches a gateway notification to it, or
//! until its owner cancels it.

use crate::config::Config;
use crate::error::AppError;
use crate::models::payment::{
    CreatePaymentRequest, Gateway, NewPayment, Payment, PaymentInstructions, PaymentIntentResponse,
    PaymentResponse, PaymentStatus,
};
use crate::models::{Page, Paginated};
use crate::services::checkout;
use crate::store::LedgerStore;

/// Create a pending payment and the checkout instructions for it.
///
/// # Process
///
/// 1. Validate the amount against the configured bounds
/// 2. Insert a `PENDING` payment (rejects a reused idempotency key)
/// 3. Derive the transfer reference from the new id
/// 4. Build VietQR or SePay instructions locally; on failure the payment is
///    cancelled again
///
/// # Errors
///
/// - `InvalidRequest`: amount outside `[min_amount, max_amount]`
/// - `Conflict`: a pending payment of this user already uses the idempotency key
/// - `Database`: storage error occurred
pub async fn create_payment(
    store: &dyn LedgerStore,
    config: &Config,
    user_id: i64,
    request: CreatePaymentRequest,
) -> Result<PaymentIntentResponse, AppError> {
    let rules = &config.payment;
    if request.amount < rules.min_amount || request.amount > rules.max_amount {
        return Err(AppError::InvalidRequest(format!(
            "amount must be between {} and {} VND",
            rules.min_amount, rules.max_amount
        )));
    }

    let gateway = request.gateway.unwrap_or(rules.default_gateway);
    let idempotency_key = request
        .idempotency_key
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty());

    let payment = store
        .insert_payment(NewPayment {
            user_id,
            amount: request.amount,
            gateway,
            description: request.description,
            idempotency_key,
        })
        .await?;

    let reference = payment.reference(&rules.reference_prefix);
    let instructions = match build_instructions(config, gateway, &payment, &reference) {
        Ok(instructions) => instructions,
        Err(e) => {
            // Release the idempotency key so the client can retry
            store.cancel_payment(user_id, payment.id).await?;
            tracing::error!(payment_id = payment.id, error = %e, "Checkout instructions failed");
            return Err(e);
        }
    };

    tracing::info!(
        payment_id = payment.id,
        user_id,
        amount = payment.amount,
        gateway = gateway.as_str(),
        reference = %reference,
        "Payment intent created"
    );

    Ok(PaymentIntentResponse {
        payment: PaymentResponse::from_payment(payment, &rules.reference_prefix),
        instructions,
    })
}

fn build_instructions(
    config: &Config,
    gateway: Gateway,
    payment: &Payment,
    reference: &str,
) -> Result<PaymentInstructions, AppError> {
    match gateway {
        Gateway::VietQr => checkout::vietqr_instructions(&config.vietqr, reference, payment.amount),
        Gateway::Sepay => {
            let description = payment
                .description
                .clone()
                .unwrap_or_else(|| format!("Top up {reference}"));
            checkout::sepay_instructions(&config.sepay, reference, payment.amount, &description)
        }
    }
}

/// Fetch a payment owned by the user.
///
/// # Security
///
/// A payment belonging to another user is reported as not found, so ids
/// cannot be probed.
pub async fn get_payment(
    store: &dyn LedgerStore,
    user_id: i64,
    payment_id: i64,
) -> Result<Payment, AppError> {
    store
        .find_payment(payment_id)
        .await?
        .filter(|payment| payment.user_id == user_id)
        .ok_or(AppError::PaymentNotFound)
}

/// The user's payments, newest first, optionally filtered by status.
pub async fn list_payments(
    store: &dyn LedgerStore,
    user_id: i64,
    status: Option<PaymentStatus>,
    page: Page,
) -> Result<Paginated<Payment>, AppError> {
    Ok(store.list_payments(user_id, status, page).await?)
}

/// Cancel a pending payment.
///
/// # Errors
///
/// - `PaymentNotFound`: absent, or owned by another user
/// - `InvalidState`: the payment already left `PENDING`
pub async fn cancel_payment(
    store: &dyn LedgerStore,
    user_id: i64,
    payment_id: i64,
) -> Result<Payment, AppError> {
    let payment = store.cancel_payment(user_id, payment_id).await?;

    tracing::info!(payment_id, user_id, "Payment cancelled");

    Ok(payment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PaymentConfig, SepayConfig, VietQrConfig};
    use crate::store::MemoryStore;

    fn config() -> Config {
        Config {
            database_url: String::new(),
            server_port: 3000,
            database_max_connections: 5,
            cors_origins: "*".to_string(),
            access_token_secret: "secret".to_string(),
            payment_api_key: None,
            payment: PaymentConfig::default(),
            vietqr: VietQrConfig {
                bank_id: "MB".to_string(),
                account_no: "0123456789".to_string(),
                account_name: "SHOP".to_string(),
                template: "compact2".to_string(),
            },
            sepay: SepayConfig {
                merchant_id: "MERCHANT".to_string(),
                secret_key: "sepay-secret".to_string(),
                ..SepayConfig::default()
            },
        }
    }

    fn request(amount: i64, gateway: Option<Gateway>, key: Option<&str>) -> CreatePaymentRequest {
        CreatePaymentRequest {
            amount,
            gateway,
            description: None,
            idempotency_key: key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn creates_pending_payment_with_qr_instructions() {
        let store = MemoryStore::new();

        let intent = create_payment(&store, &config(), 1, request(50_000, None, None))
            .await
            .unwrap();

        assert_eq!(intent.payment.status, PaymentStatus::Pending);
        assert_eq!(intent.payment.reference, format!("NAPTIEN{}", intent.payment.id));
        match intent.instructions {
            PaymentInstructions::BankTransfer {
                transfer_content,
                amount,
                ..
            } => {
                assert_eq!(transfer_content, intent.payment.reference);
                assert_eq!(amount, 50_000);
            }
            other => panic!("unexpected instructions: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sepay_gateway_returns_hosted_checkout() {
        let store = MemoryStore::new();

        let intent = create_payment(
            &store,
            &config(),
            1,
            request(20_000, Some(Gateway::Sepay), None),
        )
        .await
        .unwrap();

        assert_eq!(intent.payment.gateway, "sepay");
        assert!(matches!(
            intent.instructions,
            PaymentInstructions::HostedCheckout { .. }
        ));
    }

    #[tokio::test]
    async fn failed_checkout_releases_idempotency_key() {
        let store = MemoryStore::new();
        let unconfigured = Config {
            sepay: SepayConfig::default(),
            ..config()
        };

        let err = create_payment(
            &store,
            &unconfigured,
            1,
            request(20_000, Some(Gateway::Sepay), Some("retry-me")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));

        let orphans = list_payments(&store, 1, None, Page::default()).await.unwrap();
        assert_eq!(orphans.total, 1);
        assert_eq!(orphans.data[0].status, PaymentStatus::Cancelled);

        let intent = create_payment(
            &store,
            &config(),
            1,
            request(20_000, Some(Gateway::Sepay), Some("retry-me")),
        )
        .await
        .unwrap();
        assert_eq!(intent.payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn rejects_amount_out_of_bounds() {
        let store = MemoryStore::new();

        for amount in [0, 9_999, 100_000_001] {
            let err = create_payment(&store, &config(), 1, request(amount, None, None))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidRequest(_)), "amount {amount}");
        }

        assert!(create_payment(&store, &config(), 1, request(10_000, None, None)).await.is_ok());
        assert!(
            create_payment(&store, &config(), 1, request(100_000_000, None, None))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn duplicate_pending_idempotency_key_conflicts() {
        let store = MemoryStore::new();

        create_payment(&store, &config(), 1, request(50_000, None, Some("abc")))
            .await
            .unwrap();
        let err = create_payment(&store, &config(), 1, request(50_000, None, Some("abc")))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn foreign_payment_is_not_found() {
        let store = MemoryStore::new();
        let intent = create_payment(&store, &config(), 1, request(50_000, None, None))
            .await
            .unwrap();

        assert!(get_payment(&store, 1, intent.payment.id).await.is_ok());
        assert!(matches!(
            get_payment(&store, 2, intent.payment.id).await,
            Err(AppError::PaymentNotFound)
        ));
        assert!(matches!(
            cancel_payment(&store, 2, intent.payment.id).await,
            Err(AppError::PaymentNotFound)
        ));
    }

    #[tokio::test]
    async fn cancel_only_from_pending() {
        let store = MemoryStore::new();
        let intent = create_payment(&store, &config(), 1, request(50_000, None, None))
            .await
            .unwrap();

        let cancelled = cancel_payment(&store, 1, intent.payment.id).await.unwrap();
        assert_eq!(cancelled.status, PaymentStatus::Cancelled);

        let err = cancel_payment(&store, 1, intent.payment.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let store = MemoryStore::new();
        let first = create_payment(&store, &config(), 1, request(50_000, None, None))
            .await
            .unwrap();
        create_payment(&store, &config(), 1, request(60_000, None, None))
            .await
            .unwrap();
        cancel_payment(&store, 1, first.payment.id).await.unwrap();

        let pending = list_payments(&store, 1, Some(PaymentStatus::Pending), Page::default())
            .await
            .unwrap();
        assert_eq!(pending.total, 1);
        assert_eq!(pending.data[0].amount, 60_000);

        let all = list_payments(&store, 1, None, Page::default()).await.unwrap();
        assert_eq!(all.total, 2);
    }
}
