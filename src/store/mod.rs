//! Ledger storage port.
//!
//! Every operation that touches more than one row is atomic: implementations run
//! it inside one database transaction (PostgreSQL) or under one lock (memory).
//! Outcomes the callers branch on are returned as typed values or [`StoreError`]
//! variants, never as driver error codes.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::models::notification::{IpnNotification, NewNotification};
use crate::models::payment::{NewPayment, Payment, PaymentStatus};
use crate::models::wallet::{CreditLog, NewDebit, TopUp, Wallet};
use crate::models::{Page, Paginated};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed (connection, query, commit).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("wallet not found")]
    WalletNotFound,

    #[error("payment not found")]
    PaymentNotFound,

    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientFunds { balance: i64, required: i64 },

    /// The payment is no longer pending.
    #[error("payment is {status}")]
    InvalidState { status: PaymentStatus },

    /// A uniqueness rule was violated.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Credit to apply when a notification confirms a payment.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub payment_id: i64,
    /// Amount actually transferred, credited in full
    pub amount: i64,
    /// Gateway or bank reported by the notification
    pub gateway: String,
    pub transaction_id: Option<String>,
    /// Raw notification kept on the top-up record
    pub metadata: Option<serde_json::Value>,
}

/// What [`LedgerStore::settle_payment`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Payment moved to `Success` and the wallet was credited.
    Credited { wallet: Wallet },
    /// Payment was already `Success`; nothing changed.
    AlreadySettled,
    /// Payment is `Failed` or `Cancelled`; nothing changed.
    NotPending { status: PaymentStatus },
}

/// The storage port used by the services.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Verify the backend is reachable.
    async fn ping(&self) -> StoreResult<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Wallets and ledger
    // ─────────────────────────────────────────────────────────────────────────

    async fn find_wallet(&self, user_id: i64) -> StoreResult<Option<Wallet>>;

    /// Return the user's wallet, creating a zero-balance one if absent.
    async fn get_or_create_wallet(&self, user_id: i64) -> StoreResult<Wallet>;

    /// Take `debit.cost` from the wallet and append a `-cost` credit log, atomically.
    ///
    /// # Errors
    ///
    /// - `WalletNotFound` if the user has no wallet
    /// - `InsufficientFunds` if the balance is below the cost
    async fn debit_wallet(&self, debit: NewDebit) -> StoreResult<(Wallet, CreditLog)>;

    async fn list_credit_logs(&self, user_id: i64, page: Page)
    -> StoreResult<Paginated<CreditLog>>;

    async fn list_top_ups(&self, user_id: i64, page: Page) -> StoreResult<Paginated<TopUp>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Payments
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a pending payment.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the user already has a pending payment with the same idempotency key
    async fn insert_payment(&self, payment: NewPayment) -> StoreResult<Payment>;

    async fn find_payment(&self, payment_id: i64) -> StoreResult<Option<Payment>>;

    async fn list_payments(
        &self,
        user_id: i64,
        status: Option<PaymentStatus>,
        page: Page,
    ) -> StoreResult<Paginated<Payment>>;

    /// Move a pending payment owned by `user_id` to `Cancelled`.
    ///
    /// # Errors
    ///
    /// - `PaymentNotFound` if absent or owned by someone else
    /// - `InvalidState` if the payment is no longer pending
    async fn cancel_payment(&self, user_id: i64, payment_id: i64) -> StoreResult<Payment>;

    /// Move a pending payment to `Failed`. Returns false if it was not pending.
    async fn fail_payment(&self, payment_id: i64) -> StoreResult<bool>;

    /// Mark the payment `Success`, credit the owner's wallet (creating it if
    /// needed) and append a top-up record, all or nothing.
    ///
    /// The payment status is re-read under lock, so concurrent settlements of
    /// the same payment credit exactly once.
    ///
    /// # Errors
    ///
    /// - `PaymentNotFound` if the payment does not exist
    async fn settle_payment(&self, settlement: Settlement) -> StoreResult<SettleOutcome>;

    // ─────────────────────────────────────────────────────────────────────────
    // Notification audit log
    // ─────────────────────────────────────────────────────────────────────────

    async fn record_notification(&self, notification: NewNotification)
    -> StoreResult<IpnNotification>;

    /// Attach the matched payment to an audit row.
    async fn link_notification(&self, notification_id: i64, payment_id: i64) -> StoreResult<()>;
}
