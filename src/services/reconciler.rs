//! Webhook reconciler - turns gateway notifications into credited top-ups.
//!
//! # Process
//!
//! For every delivery, in order:
//!
//! 1. Store the raw body (and any parsed fields) in the audit log
//! 2. Ignore notifications that do not report money received
//! 3. Extract the payment id from the transfer reference
//! 4. Look up the payment
//! 5. Link the audit row to the payment
//! 6. Require a conclusive status from the gateway and a credit amount
//!    within the configured payment bounds
//! 7. Fail the payment if less money arrived than expected
//! 8. Skip payments that are already settled
//! 9. Settle: payment `SUCCESS`, wallet credited, top-up recorded, atomically
//!
//! # Delivery Semantics
//!
//! Gateways retry until they get a success response, so every business
//! mismatch is acknowledged and logged. Only storage failures are returned as
//! errors, which makes the gateway try again later. Redelivering a settled
//! notification credits nothing.

use crate::config::PaymentConfig;
use crate::error::AppError;
use crate::models::notification::{
    InboundNotification, NewNotification, Notification, UNPARSEABLE,
};
use crate::models::payment::PaymentStatus;
use crate::store::{LedgerStore, SettleOutcome, Settlement};

/// What reconciling one delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Body matched neither payload shape; only audited.
    Unparseable,
    /// Notification type does not report money received.
    Ignored { notification_type: String },
    /// No payment id could be read from the reference texts.
    Unmatched,
    /// Reference pointed at a payment that does not exist.
    UnknownPayment { payment_id: i64 },
    /// Gateway status is not final, or the amount is missing; payment stays pending.
    Inconclusive { payment_id: i64 },
    /// Reported amount is zero, negative or above the payment maximum; left for manual review.
    AmountRejected { payment_id: i64, received: i64 },
    /// Less money arrived than expected.
    AmountShort {
        payment_id: i64,
        expected: i64,
        received: i64,
    },
    /// Payment was already settled by an earlier delivery.
    AlreadySettled { payment_id: i64 },
    /// Payment was failed or cancelled before the money arrived.
    NotPending {
        payment_id: i64,
        status: PaymentStatus,
    },
    /// Wallet credited.
    Credited {
        payment_id: i64,
        amount: i64,
        new_balance: i64,
    },
}

/// Reconcile one webhook delivery.
///
/// # Arguments
///
/// * `raw_payload` - Request body exactly as received
/// * `config` - Reference prefix and the largest amount a delivery may credit
///
/// # Errors
///
/// Only storage failures. Everything else resolves to a [`ReconcileOutcome`].
pub async fn handle_notification(
    store: &dyn LedgerStore,
    config: &PaymentConfig,
    raw_payload: &str,
) -> Result<ReconcileOutcome, AppError> {
    let inbound = match serde_json::from_str::<InboundNotification>(raw_payload) {
        Ok(inbound) => inbound,
        Err(e) => {
            store
                .record_notification(NewNotification {
                    gateway: "unknown".to_string(),
                    notification_type: UNPARSEABLE.to_string(),
                    raw_payload: raw_payload.to_string(),
                    ..NewNotification::default()
                })
                .await?;
            tracing::warn!(error = %e, "Unparseable payment notification stored");
            return Ok(ReconcileOutcome::Unparseable);
        }
    };

    let (notification, record) = inbound.normalize(raw_payload);
    let audit = store.record_notification(record).await?;

    let outcome = reconcile(store, config, &notification, audit.id, raw_payload).await?;

    tracing::info!(
        notification_id = audit.id,
        gateway = %notification.gateway,
        notification_type = %notification.notification_type,
        outcome = ?outcome,
        "Payment notification processed"
    );

    Ok(outcome)
}

async fn reconcile(
    store: &dyn LedgerStore,
    config: &PaymentConfig,
    notification: &Notification,
    notification_id: i64,
    raw_payload: &str,
) -> Result<ReconcileOutcome, AppError> {
    if !notification.is_payment_completed() {
        return Ok(ReconcileOutcome::Ignored {
            notification_type: notification.notification_type.clone(),
        });
    }

    let Some(payment_id) =
        extract_payment_id(&notification.reference_texts, &config.reference_prefix)
    else {
        tracing::warn!(
            notification_id,
            texts = ?notification.reference_texts,
            "No payment reference in notification"
        );
        return Ok(ReconcileOutcome::Unmatched);
    };

    let Some(payment) = store.find_payment(payment_id).await? else {
        tracing::warn!(notification_id, payment_id, "Notification references unknown payment");
        return Ok(ReconcileOutcome::UnknownPayment { payment_id });
    };

    store.link_notification(notification_id, payment_id).await?;

    let received = match notification.transferred_amount {
        Some(amount) if notification.is_conclusive() => amount,
        _ => {
            tracing::info!(
                payment_id,
                order_status = ?notification.order_status,
                transaction_status = ?notification.transaction_status,
                "Notification not conclusive, payment stays pending"
            );
            return Ok(ReconcileOutcome::Inconclusive { payment_id });
        }
    };

    if received <= 0 || received > config.max_amount {
        tracing::warn!(
            payment_id,
            received,
            max_amount = config.max_amount,
            "Transferred amount out of range, left for manual review"
        );
        return Ok(ReconcileOutcome::AmountRejected {
            payment_id,
            received,
        });
    }

    if received < payment.amount {
        let failed = store.fail_payment(payment_id).await?;
        tracing::warn!(
            payment_id,
            expected = payment.amount,
            received,
            failed,
            "Transferred amount below expected"
        );
        return Ok(ReconcileOutcome::AmountShort {
            payment_id,
            expected: payment.amount,
            received,
        });
    }

    if payment.status == PaymentStatus::Success {
        return Ok(ReconcileOutcome::AlreadySettled { payment_id });
    }

    let settlement = Settlement {
        payment_id,
        amount: received,
        gateway: notification
            .payment_method
            .clone()
            .unwrap_or_else(|| notification.gateway.clone()),
        transaction_id: notification.transaction_id.clone(),
        metadata: serde_json::from_str(raw_payload).ok(),
    };

    let outcome = match store.settle_payment(settlement).await? {
        SettleOutcome::Credited { wallet } => {
            tracing::info!(
                payment_id,
                user_id = wallet.user_id,
                amount = received,
                new_balance = wallet.balance,
                "Wallet credited"
            );
            ReconcileOutcome::Credited {
                payment_id,
                amount: received,
                new_balance: wallet.balance,
            }
        }
        SettleOutcome::AlreadySettled => ReconcileOutcome::AlreadySettled { payment_id },
        SettleOutcome::NotPending { status } => {
            tracing::warn!(
                payment_id,
                %status,
                received,
                "Money received for a payment that is no longer pending"
            );
            ReconcileOutcome::NotPending { payment_id, status }
        }
    };

    Ok(outcome)
}

/// Read a payment id out of the reference texts.
///
/// Tries, in order:
/// 1. `prefix` followed by digits, case-insensitive, anywhere in any text
/// 2. All digits of the first text concatenated
pub fn extract_payment_id(texts: &[String], prefix: &str) -> Option<i64> {
    texts
        .iter()
        .find_map(|text| find_prefixed_id(text, prefix))
        .or_else(|| {
            let digits: String = texts
                .first()?
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        })
}

fn find_prefixed_id(text: &str, prefix: &str) -> Option<i64> {
    if prefix.is_empty() {
        return None;
    }

    let haystack = text.to_ascii_uppercase();
    let needle = prefix.to_ascii_uppercase();

    haystack.match_indices(&needle).find_map(|(start, _)| {
        let digits: String = haystack[start + needle.len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    })
}
