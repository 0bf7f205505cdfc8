//! Payment intent models and API request/response types.
//!
//! This module defines:
//! - `Payment`: Database entity representing an expected inbound transfer
//! - `PaymentStatus` / `Gateway`: the lifecycle and the checkout flavour of a payment
//! - Request and response bodies for the payment endpoints

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a payment.
///
/// `Pending` is the only non-terminal state. Reconciliation drives it to
/// `Success` or `Failed`; only the owner can move it to `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checkout flavour used when creating a payment.
///
/// - `VietQr`: payer scans a bank-transfer QR code; the bank feed reports the transfer
/// - `Sepay`: payer is redirected to the SePay hosted checkout; SePay sends an IPN
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gateway {
    #[default]
    VietQr,
    Sepay,
}

impl Gateway {
    pub fn as_str(self) -> &'static str {
        match self {
            Gateway::VietQr => "vietqr",
            Gateway::Sepay => "sepay",
        }
    }
}

/// Represents a payment record from the database.
///
/// # Database Table
///
/// Maps to the `payments` table. The surrogate `id` doubles as the
/// human-visible transfer reference (`<prefix><id>`), so a bank memo can be
/// parsed back to the payment without a lookup table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Payment {
    pub id: i64,

    /// Owner, an opaque user id issued by the auth service
    pub user_id: i64,

    /// Expected amount in VND (minor unit, always positive)
    pub amount: i64,

    pub status: PaymentStatus,

    /// Gateway tag, see [`Gateway::as_str`]
    pub gateway: String,

    pub description: Option<String>,

    /// Optional client-supplied key; unique among a user's pending payments
    pub idempotency_key: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Set when reconciliation moves the payment to `Success`
    pub paid_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Transfer memo the payer must use, e.g. `NAPTIEN42`.
    pub fn reference(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.id)
    }
}

/// Values needed to insert a new pending payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: i64,
    pub amount: i64,
    pub gateway: Gateway,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Request body for creating a payment intent.
///
/// # JSON Example
///
/// ```json
/// {
///   "amount": 50000,
///   "gateway": "vietqr",
///   "description": "Top up",
///   "idempotency_key": "topup-2025-001"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub amount: i64,

    /// Defaults to the configured gateway when omitted
    pub gateway: Option<Gateway>,

    pub description: Option<String>,

    pub idempotency_key: Option<String>,
}

/// Query string for listing payments.
#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<PaymentStatus>,
}

/// Response body describing a payment.
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: i64,
    pub reference: String,
    pub amount: i64,
    pub status: PaymentStatus,
    pub gateway: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentResponse {
    pub fn from_payment(payment: Payment, prefix: &str) -> Self {
        Self {
            reference: payment.reference(prefix),
            id: payment.id,
            amount: payment.amount,
            status: payment.status,
            gateway: payment.gateway,
            description: payment.description,
            created_at: payment.created_at,
            paid_at: payment.paid_at,
        }
    }
}

/// Checkout instructions handed back to the payer.
///
/// # JSON Example (bank transfer)
///
/// ```json
/// {
///   "type": "bank_transfer",
///   "qr_url": "https://img.vietqr.io/image/MB-0123456789-compact2.png?amount=50000&addInfo=NAPTIEN42",
///   "bank_id": "MB",
///   "account_number": "0123456789",
///   "account_name": "NGUYEN VAN A",
///   "transfer_content": "NAPTIEN42",
///   "amount": 50000
/// }
/// ```
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentInstructions {
    BankTransfer {
        qr_url: String,
        bank_id: String,
        account_number: String,
        account_name: String,
        transfer_content: String,
        amount: i64,
    },
    HostedCheckout {
        action_url: String,
        /// Signed form fields, including `signature`
        fields: BTreeMap<String, String>,
        /// Auto-submitting HTML page posting `fields` to `action_url`
        html: String,
    },
}

/// Response body for a newly created payment intent.
#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub payment: PaymentResponse,
    pub instructions: PaymentInstructions,
}
