//! Wallet and ledger data models.
//!
//! This module defines:
//! - `Wallet`: per-user credit balance with running top-up/spend counters
//! - `CreditLog`: append-only record of every spend
//! - `TopUp`: append-only record of every confirmed top-up
//!
//! # Balance Storage
//!
//! Amounts are `i64` VND. The balance never goes below zero and always equals
//! `total_top_up - total_spent`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::payment::PaymentStatus;
use crate::pricing::{ActionKind, Resolution};

/// Represents a wallet record from the database.
///
/// # Database Table
///
/// Maps to the `wallets` table, keyed by `user_id`. Created lazily with a zero
/// balance on the first balance query or the first credit.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Wallet {
    pub user_id: i64,

    /// Spendable balance, must be >= 0 (enforced by the ledger and a CHECK constraint)
    pub balance: i64,

    /// Sum of every confirmed top-up, never decreases
    pub total_top_up: i64,

    /// Sum of every deduction, never decreases
    pub total_spent: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Fresh zero-balance wallet.
    pub fn empty(user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance: 0,
            total_top_up: 0,
            total_spent: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Ledger entry for a balance-affecting event.
///
/// `amount` is signed: negative for spend.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CreditLog {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub action: String,
    pub description: Option<String>,
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A debit to apply atomically together with its ledger entry.
#[derive(Debug, Clone)]
pub struct NewDebit {
    pub user_id: i64,
    /// Positive amount to take from the balance
    pub cost: i64,
    pub action: String,
    pub description: Option<String>,
    pub request_id: Option<String>,
}

/// Record of a successful credit event.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct TopUp {
    pub id: i64,
    pub user_id: i64,
    pub payment_id: i64,
    pub amount: i64,
    pub status: PaymentStatus,
    pub gateway: String,
    pub transaction_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Balance snapshot returned to clients.
///
/// # JSON Example
///
/// ```json
/// { "balance": 45000, "total_top_up": 50000, "total_spent": 5000 }
/// ```
#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub balance: i64,
    pub total_top_up: i64,
    pub total_spent: i64,
}

impl From<Wallet> for WalletResponse {
    fn from(wallet: Wallet) -> Self {
        Self {
            balance: wallet.balance,
            total_top_up: wallet.total_top_up,
            total_spent: wallet.total_spent,
        }
    }
}

/// Priced action parameters shared by the estimate and deduct endpoints.
///
/// # JSON Example
///
/// ```json
/// { "action": "generate-images", "image_count": 2, "use_pro": false, "resolution": "2K" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRequest {
    pub action: String,

    #[serde(default = "default_image_count")]
    pub image_count: u32,

    #[serde(default)]
    pub use_pro: bool,

    #[serde(default)]
    pub resolution: Resolution,
}

fn default_image_count() -> u32 {
    1
}

/// Request body for deducting credit ahead of a priced action.
#[derive(Debug, Deserialize)]
pub struct DeductRequest {
    #[serde(flatten)]
    pub action: ActionRequest,

    pub description: Option<String>,

    /// Caller's trace id, stored on the ledger entry
    pub request_id: Option<String>,
}

/// A validated priced action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedAction {
    pub action: ActionKind,
    pub image_count: u32,
    pub use_pro: bool,
    pub resolution: Resolution,
}

/// Response body for a deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeductionResult {
    pub amount_deducted: i64,
    pub new_balance: i64,
}

/// Response body for a cost estimate.
#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub estimated_cost: i64,
    pub current_balance: i64,
    pub can_afford: bool,
}

/// Ledger entry as returned to clients.
#[derive(Debug, Serialize)]
pub struct CreditLogResponse {
    pub id: i64,
    pub amount: i64,
    pub action: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CreditLog> for CreditLogResponse {
    fn from(log: CreditLog) -> Self {
        Self {
            id: log.id,
            amount: log.amount,
            action: log.action,
            description: log.description,
            created_at: log.created_at,
        }
    }
}

/// Top-up record as returned to clients.
#[derive(Debug, Serialize)]
pub struct TopUpResponse {
    pub id: i64,
    pub payment_id: i64,
    pub amount: i64,
    pub status: PaymentStatus,
    pub gateway: String,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<TopUp> for TopUpResponse {
    fn from(top_up: TopUp) -> Self {
        Self {
            id: top_up.id,
            payment_id: top_up.payment_id,
            amount: top_up.amount,
            status: top_up.status,
            gateway: top_up.gateway,
            transaction_id: top_up.transaction_id,
            created_at: top_up.created_at,
        }
    }
}
