//! Inbound payment notification models.
//!
//! Two payload shapes reach the webhook endpoint:
//!
//! - **IPN** from the SePay hosted checkout: nested `order` / `transaction` objects
//! - **Bank feed** from the bank-transfer watcher behind VietQR payments: one flat object
//!   per credited transfer
//!
//! Both are normalized into [`Notification`] before reconciliation, and every
//! delivery is stored verbatim as an [`IpnNotification`] audit row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification type of an IPN that reports a completed payment.
pub const ORDER_PAID: &str = "ORDER_PAID";
/// `order_status` of a captured order.
pub const ORDER_CAPTURED: &str = "CAPTURED";
/// `transaction_status` of an approved transaction.
pub const TRANSACTION_APPROVED: &str = "APPROVED";
/// Notification type recorded for bodies that match neither shape.
pub const UNPARSEABLE: &str = "UNPARSEABLE";

/// Audit log row for one webhook delivery.
///
/// # Database Table
///
/// Maps to the `ipn_notifications` table. Rows are never updated except to
/// attach `payment_id` once the notification is matched.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct IpnNotification {
    pub id: i64,
    pub gateway: String,
    pub notification_type: String,
    pub order_reference: Option<String>,
    pub order_status: Option<String>,
    pub order_amount: Option<String>,
    pub transaction_id: Option<String>,
    pub transaction_status: Option<String>,
    pub transaction_amount: Option<String>,
    pub payment_method: Option<String>,
    pub transfer_content: Option<String>,
    /// Request body exactly as received
    pub raw_payload: String,
    pub payment_id: Option<i64>,
    pub received_at: DateTime<Utc>,
}

/// Values needed to insert an audit row.
#[derive(Debug, Clone, Default)]
pub struct NewNotification {
    pub gateway: String,
    pub notification_type: String,
    pub order_reference: Option<String>,
    pub order_status: Option<String>,
    pub order_amount: Option<String>,
    pub transaction_id: Option<String>,
    pub transaction_status: Option<String>,
    pub transaction_amount: Option<String>,
    pub payment_method: Option<String>,
    pub transfer_content: Option<String>,
    pub raw_payload: String,
}

/// Body accepted by the webhook endpoint, whichever gateway sent it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundNotification {
    Ipn(IpnPayload),
    BankTransfer(BankTransferPayload),
}

/// SePay IPN body.
///
/// # JSON Example
///
/// ```json
/// {
///   "timestamp": 1735689600,
///   "notification_type": "ORDER_PAID",
///   "order": {
///     "id": "e2c1...", "order_id": "NAPTIEN42", "order_status": "CAPTURED",
///     "order_currency": "VND", "order_amount": "50000.00", "order_invoice_number": "NAPTIEN42"
///   },
///   "transaction": {
///     "id": "384c...", "payment_method": "BANK_TRANSFER", "transaction_id": "68ef...",
///     "transaction_type": "PAYMENT", "transaction_date": "2025-01-01 08:00:00",
///     "transaction_status": "APPROVED", "transaction_amount": "50000", "transaction_currency": "VND"
///   }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct IpnPayload {
    pub timestamp: Option<i64>,
    pub notification_type: String,
    pub order: IpnOrder,
    pub transaction: Option<IpnTransaction>,
    pub customer: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpnOrder {
    pub id: Option<String>,
    pub order_id: Option<String>,
    pub order_status: Option<String>,
    pub order_currency: Option<String>,
    pub order_amount: Option<String>,
    pub order_invoice_number: String,
    pub order_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpnTransaction {
    pub id: Option<String>,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub transaction_type: Option<String>,
    pub transaction_date: Option<String>,
    pub transaction_status: Option<String>,
    pub transaction_amount: Option<String>,
    pub transaction_currency: Option<String>,
}

/// Bank feed body, one per transfer on the beneficiary account.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": 92704,
///   "gateway": "MBBank",
///   "transactionDate": "2025-01-01 08:00:00",
///   "accountNumber": "0123456789",
///   "code": null,
///   "content": "NAPTIEN42 chuyen tien",
///   "transferType": "in",
///   "transferAmount": 50000,
///   "accumulated": 1250000,
///   "subAccount": null,
///   "referenceCode": "MBVCB.3278907687",
///   "description": "BankAPINotify NAPTIEN42 chuyen tien"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransferPayload {
    pub id: Option<i64>,
    pub gateway: String,
    pub transaction_date: Option<String>,
    pub account_number: Option<String>,
    pub code: Option<String>,
    pub content: Option<String>,
    pub transfer_type: String,
    pub transfer_amount: i64,
    pub accumulated: Option<i64>,
    pub sub_account: Option<String>,
    pub reference_code: Option<String>,
    pub description: Option<String>,
}

/// Which status rules apply to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSource {
    Ipn,
    BankTransfer,
}

/// Gateway-independent view of a delivery, built before reconciliation.
#[derive(Debug, Clone)]
pub struct Notification {
    pub source: NotificationSource,
    pub gateway: String,
    pub notification_type: String,
    /// Texts that may carry the transfer reference, most specific first
    pub reference_texts: Vec<String>,
    pub order_status: Option<String>,
    pub transaction_status: Option<String>,
    /// Amount actually transferred, when it could be parsed
    pub transferred_amount: Option<i64>,
    pub transaction_id: Option<String>,
    pub payment_method: Option<String>,
}

impl Notification {
    /// Whether this delivery reports money received, as opposed to a void,
    /// refund, outgoing transfer or informational event.
    pub fn is_payment_completed(&self) -> bool {
        match self.source {
            NotificationSource::Ipn => self.notification_type == ORDER_PAID,
            NotificationSource::BankTransfer => self.notification_type.eq_ignore_ascii_case("in"),
        }
    }

    /// Whether the gateway reports the payment as final.
    ///
    /// A bank-feed credit is final by itself; an IPN needs a captured order
    /// and an approved transaction.
    pub fn is_conclusive(&self) -> bool {
        match self.source {
            NotificationSource::Ipn => {
                self.order_status.as_deref() == Some(ORDER_CAPTURED)
                    && self.transaction_status.as_deref() == Some(TRANSACTION_APPROVED)
            }
            NotificationSource::BankTransfer => true,
        }
    }
}

impl InboundNotification {
    /// Normalized view plus the audit row describing it.
    pub fn normalize(&self, raw_payload: &str) -> (Notification, NewNotification) {
        match self {
            InboundNotification::Ipn(ipn) => {
                let transaction = ipn.transaction.as_ref();
                let transaction_amount =
                    transaction.and_then(|t| t.transaction_amount.clone());

                let mut reference_texts = vec![ipn.order.order_invoice_number.clone()];
                reference_texts.extend(ipn.order.order_description.iter().cloned());

                let notification = Notification {
                    source: NotificationSource::Ipn,
                    gateway: "sepay".to_string(),
                    notification_type: ipn.notification_type.clone(),
                    reference_texts,
                    order_status: ipn.order.order_status.clone(),
                    transaction_status: transaction.and_then(|t| t.transaction_status.clone()),
                    transferred_amount: transaction_amount.as_deref().and_then(parse_amount),
                    transaction_id: transaction.and_then(|t| t.transaction_id.clone()),
                    payment_method: transaction.and_then(|t| t.payment_method.clone()),
                };

                let record = NewNotification {
                    gateway: notification.gateway.clone(),
                    notification_type: ipn.notification_type.clone(),
                    order_reference: Some(ipn.order.order_invoice_number.clone()),
                    order_status: ipn.order.order_status.clone(),
                    order_amount: ipn.order.order_amount.clone(),
                    transaction_id: notification.transaction_id.clone(),
                    transaction_status: notification.transaction_status.clone(),
                    transaction_amount,
                    payment_method: notification.payment_method.clone(),
                    transfer_content: ipn.order.order_description.clone(),
                    raw_payload: raw_payload.to_string(),
                };

                (notification, record)
            }
            InboundNotification::BankTransfer(transfer) => {
                let reference_texts: Vec<String> = [
                    transfer.code.as_ref(),
                    transfer.content.as_ref(),
                    transfer.description.as_ref(),
                ]
                .into_iter()
                .flatten()
                .filter(|text| !text.trim().is_empty())
                .cloned()
                .collect();

                let transaction_id = transfer
                    .reference_code
                    .clone()
                    .or_else(|| transfer.id.map(|id| id.to_string()));

                let notification = Notification {
                    source: NotificationSource::BankTransfer,
                    gateway: transfer.gateway.clone(),
                    notification_type: transfer.transfer_type.clone(),
                    reference_texts,
                    order_status: None,
                    transaction_status: None,
                    transferred_amount: Some(transfer.transfer_amount),
                    transaction_id: transaction_id.clone(),
                    payment_method: Some("BANK_TRANSFER".to_string()),
                };

                let record = NewNotification {
                    gateway: transfer.gateway.clone(),
                    notification_type: transfer.transfer_type.clone(),
                    order_reference: transfer.code.clone(),
                    order_status: None,
                    order_amount: None,
                    transaction_id,
                    transaction_status: None,
                    transaction_amount: Some(transfer.transfer_amount.to_string()),
                    payment_method: notification.payment_method.clone(),
                    transfer_content: transfer.content.clone().or_else(|| transfer.description.clone()),
                    raw_payload: raw_payload.to_string(),
                };

                (notification, record)
            }
        }
    }
}

/// Parse a gateway amount such as `"50000"` or `"50000.00"`.
///
/// Only the integer part counts; VND has no minor unit in practice.
pub fn parse_amount(raw: &str) -> Option<i64> {
    let integer_part = raw.trim().split('.').next()?;
    let digits: String = integer_part.chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}
