//! PostgreSQL implementation of the ledger store.
//!
//! # Atomicity Guarantees
//!
//! All balance updates happen within PostgreSQL transactions, with the row being
//! changed locked by `SELECT ... FOR UPDATE` first. Two deductions for the same
//! wallet, or two settlements of the same payment, therefore serialize.

use async_trait::async_trait;

use crate::db::DbPool;
use crate::models::notification::{IpnNotification, NewNotification};
use crate::models::payment::{NewPayment, Payment, PaymentStatus};
use crate::models::wallet::{CreditLog, NewDebit, TopUp, Wallet};
use crate::models::{Page, Paginated};
use crate::store::{LedgerStore, SettleOutcome, Settlement, StoreError, StoreResult};

const WALLET_COLUMNS: &str = "user_id, balance, total_top_up, total_spent, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map a unique-index violation to `Conflict`, keeping other errors as they are.
fn conflict_or_database(error: sqlx::Error, message: &str) -> StoreError {
    match &error {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            StoreError::Conflict(message.to_string())
        }
        _ => StoreError::Database(error),
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_wallet(&self, user_id: i64) -> StoreResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    async fn get_or_create_wallet(&self, user_id: i64) -> StoreResult<Wallet> {
        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        self.find_wallet(user_id)
            .await?
            .ok_or(StoreError::WalletNotFound)
    }

    async fn debit_wallet(&self, debit: NewDebit) -> StoreResult<(Wallet, CreditLog)> {
        let mut tx = self.pool.begin().await?;

        // Lock the wallet and check balance
        let balance: i64 =
            sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = $1 FOR UPDATE")
                .bind(debit.user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::WalletNotFound)?;

        if balance < debit.cost {
            tx.rollback().await?;
            return Err(StoreError::InsufficientFunds {
                balance,
                required: debit.cost,
            });
        }

        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            r#"
            UPDATE wallets
            SET balance = balance - $1,
                total_spent = total_spent + $1,
                updated_at = NOW()
            WHERE user_id = $2
            RETURNING {WALLET_COLUMNS}
            "#
        ))
        .bind(debit.cost)
        .bind(debit.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let log = sqlx::query_as::<_, CreditLog>(
            r#"
            INSERT INTO credit_logs (user_id, amount, action, description, request_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(debit.user_id)
        .bind(-debit.cost)
        .bind(&debit.action)
        .bind(&debit.description)
        .bind(&debit.request_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((wallet, log))
    }

    async fn list_credit_logs(
        &self,
        user_id: i64,
        page: Page,
    ) -> StoreResult<Paginated<CreditLog>> {
        let logs = sqlx::query_as::<_, CreditLog>(
            r#"
            SELECT * FROM credit_logs
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM credit_logs WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Paginated::new(logs, total, page))
    }

    async fn list_top_ups(&self, user_id: i64, page: Page) -> StoreResult<Paginated<TopUp>> {
        let top_ups = sqlx::query_as::<_, TopUp>(
            r#"
            SELECT * FROM top_ups
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM top_ups WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Paginated::new(top_ups, total, page))
    }

    async fn insert_payment(&self, payment: NewPayment) -> StoreResult<Payment> {
        let mut tx = self.pool.begin().await?;

        if let Some(ref key) = payment.idempotency_key {
            let pending: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM payments
                    WHERE user_id = $1 AND idempotency_key = $2 AND status = 'PENDING'
                )
                "#,
            )
            .bind(payment.user_id)
            .bind(key)
            .fetch_one(&mut *tx)
            .await?;

            if pending {
                tx.rollback().await?;
                return Err(StoreError::Conflict(format!(
                    "a pending payment already uses idempotency key {key}"
                )));
            }
        }

        // The partial unique index catches a concurrent insert with the same key
        let created = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (user_id, amount, status, gateway, description, idempotency_key)
            VALUES ($1, $2, 'PENDING', $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(payment.user_id)
        .bind(payment.amount)
        .bind(payment.gateway.as_str())
        .bind(&payment.description)
        .bind(&payment.idempotency_key)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_or_database(e, "a pending payment already uses this idempotency key"))?;

        tx.commit().await?;

        Ok(created)
    }

    async fn find_payment(&self, payment_id: i64) -> StoreResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn list_payments(
        &self,
        user_id: i64,
        status: Option<PaymentStatus>,
        page: Page,
    ) -> StoreResult<Paginated<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE user_id = $1 AND ($2::payment_status IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(status)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM payments WHERE user_id = $1 AND ($2::payment_status IS NULL OR status = $2)",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(Paginated::new(payments, total, page))
    }

    async fn cancel_payment(&self, user_id: i64, payment_id: i64) -> StoreResult<Payment> {
        let mut tx = self.pool.begin().await?;

        let status: PaymentStatus = sqlx::query_scalar(
            "SELECT status FROM payments WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(payment_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::PaymentNotFound)?;

        if status != PaymentStatus::Pending {
            tx.rollback().await?;
            return Err(StoreError::InvalidState { status });
        }

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = 'CANCELLED', updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(payment)
    }

    async fn fail_payment(&self, payment_id: i64) -> StoreResult<bool> {
        // The status guard keeps terminal payments terminal
        let updated = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'FAILED', updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(payment_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn settle_payment(&self, settlement: Settlement) -> StoreResult<SettleOutcome> {
        let mut tx = self.pool.begin().await?;

        // Lock the payment so concurrent deliveries see each other's result
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
            .bind(settlement.payment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::PaymentNotFound)?;

        match payment.status {
            PaymentStatus::Pending => {}
            PaymentStatus::Success => {
                tx.rollback().await?;
                return Ok(SettleOutcome::AlreadySettled);
            }
            status => {
                tx.rollback().await?;
                return Ok(SettleOutcome::NotPending { status });
            }
        }

        sqlx::query(
            r#"
            UPDATE payments
            SET status = 'SUCCESS', paid_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(payment.id)
        .execute(&mut *tx)
        .await?;

        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            r#"
            INSERT INTO wallets (user_id, balance, total_top_up, total_spent)
            VALUES ($1, $2, $2, 0)
            ON CONFLICT (user_id) DO UPDATE
            SET balance = wallets.balance + EXCLUDED.balance,
                total_top_up = wallets.total_top_up + EXCLUDED.total_top_up,
                updated_at = NOW()
            RETURNING {WALLET_COLUMNS}
            "#
        ))
        .bind(payment.user_id)
        .bind(settlement.amount)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO top_ups (user_id, payment_id, amount, status, gateway, transaction_id, metadata)
            VALUES ($1, $2, $3, 'SUCCESS', $4, $5, $6)
            "#,
        )
        .bind(payment.user_id)
        .bind(payment.id)
        .bind(settlement.amount)
        .bind(&settlement.gateway)
        .bind(&settlement.transaction_id)
        .bind(&settlement.metadata)
        .execute(&mut *tx)
        .await?;

        // Commit all three writes atomically
        tx.commit().await?;

        Ok(SettleOutcome::Credited { wallet })
    }

    async fn record_notification(
        &self,
        notification: NewNotification,
    ) -> StoreResult<IpnNotification> {
        let record = sqlx::query_as::<_, IpnNotification>(
            r#"
            INSERT INTO ipn_notifications (
                gateway,
                notification_type,
                order_reference,
                order_status,
                order_amount,
                transaction_id,
                transaction_status,
                transaction_amount,
                payment_method,
                transfer_content,
                raw_payload
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(notification.gateway)
        .bind(notification.notification_type)
        .bind(notification.order_reference)
        .bind(notification.order_status)
        .bind(notification.order_amount)
        .bind(notification.transaction_id)
        .bind(notification.transaction_status)
        .bind(notification.transaction_amount)
        .bind(notification.payment_method)
        .bind(notification.transfer_content)
        .bind(notification.raw_payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn link_notification(&self, notification_id: i64, payment_id: i64) -> StoreResult<()> {
        sqlx::query("UPDATE ipn_notifications SET payment_id = $1 WHERE id = $2")
            .bind(payment_id)
            .bind(notification_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
