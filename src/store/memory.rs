//! In-memory implementation of the ledger store.
//!
//! Every operation runs under one `parking_lot::Mutex`, which gives the same
//! all-or-nothing and per-row serialization guarantees as the PostgreSQL store.
//! Backs the unit and router tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::models::notification::{IpnNotification, NewNotification};
use crate::models::payment::{NewPayment, Payment, PaymentStatus};
use crate::models::wallet::{CreditLog, NewDebit, TopUp, Wallet};
use crate::models::{Page, Paginated};
use crate::store::{LedgerStore, SettleOutcome, Settlement, StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    wallets: HashMap<i64, Wallet>,
    payments: Vec<Payment>,
    credit_logs: Vec<CreditLog>,
    top_ups: Vec<TopUp>,
    notifications: Vec<IpnNotification>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every audit row recorded so far, oldest first.
    pub fn notifications(&self) -> Vec<IpnNotification> {
        self.inner.lock().notifications.clone()
    }

    /// Every credit log row, oldest first.
    pub fn credit_logs(&self, user_id: i64) -> Vec<CreditLog> {
        self.inner
            .lock()
            .credit_logs
            .iter()
            .filter(|log| log.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Every top-up row, oldest first.
    pub fn top_ups(&self, user_id: i64) -> Vec<TopUp> {
        self.inner
            .lock()
            .top_ups
            .iter()
            .filter(|top_up| top_up.user_id == user_id)
            .cloned()
            .collect()
    }
}

impl Tables {
    fn payment_mut(&mut self, payment_id: i64) -> Option<&mut Payment> {
        self.payments.iter_mut().find(|p| p.id == payment_id)
    }
}

/// Newest first, then cut out the requested page.
fn paginate<T: Clone>(mut rows: Vec<T>, page: Page) -> Paginated<T> {
    rows.reverse();
    let total = rows.len() as i64;
    let data = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
    Paginated::new(data, total, page)
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_wallet(&self, user_id: i64) -> StoreResult<Option<Wallet>> {
        Ok(self.inner.lock().wallets.get(&user_id).cloned())
    }

    async fn get_or_create_wallet(&self, user_id: i64) -> StoreResult<Wallet> {
        let mut tables = self.inner.lock();
        let wallet = tables
            .wallets
            .entry(user_id)
            .or_insert_with(|| Wallet::empty(user_id));
        Ok(wallet.clone())
    }

    async fn debit_wallet(&self, debit: NewDebit) -> StoreResult<(Wallet, CreditLog)> {
        let mut tables = self.inner.lock();

        let wallet = tables
            .wallets
            .get_mut(&debit.user_id)
            .ok_or(StoreError::WalletNotFound)?;

        if wallet.balance < debit.cost {
            return Err(StoreError::InsufficientFunds {
                balance: wallet.balance,
                required: debit.cost,
            });
        }

        let now = Utc::now();
        wallet.balance -= debit.cost;
        wallet.total_spent += debit.cost;
        wallet.updated_at = now;
        let wallet = wallet.clone();

        let log = CreditLog {
            id: tables.credit_logs.len() as i64 + 1,
            user_id: debit.user_id,
            amount: -debit.cost,
            action: debit.action,
            description: debit.description,
            request_id: debit.request_id,
            created_at: now,
        };
        tables.credit_logs.push(log.clone());

        Ok((wallet, log))
    }

    async fn list_credit_logs(
        &self,
        user_id: i64,
        page: Page,
    ) -> StoreResult<Paginated<CreditLog>> {
        Ok(paginate(self.credit_logs(user_id), page))
    }

    async fn list_top_ups(&self, user_id: i64, page: Page) -> StoreResult<Paginated<TopUp>> {
        Ok(paginate(self.top_ups(user_id), page))
    }

    async fn insert_payment(&self, payment: NewPayment) -> StoreResult<Payment> {
        let mut tables = self.inner.lock();

        if let Some(ref key) = payment.idempotency_key {
            let pending = tables.payments.iter().any(|p| {
                p.user_id == payment.user_id
                    && p.status == PaymentStatus::Pending
                    && p.idempotency_key.as_deref() == Some(key.as_str())
            });
            if pending {
                return Err(StoreError::Conflict(format!(
                    "a pending payment already uses idempotency key {key}"
                )));
            }
        }

        let now = Utc::now();
        let created = Payment {
            id: tables.payments.len() as i64 + 1,
            user_id: payment.user_id,
            amount: payment.amount,
            status: PaymentStatus::Pending,
            gateway: payment.gateway.as_str().to_string(),
            description: payment.description,
            idempotency_key: payment.idempotency_key,
            created_at: now,
            updated_at: now,
            paid_at: None,
        };
        tables.payments.push(created.clone());

        Ok(created)
    }

    async fn find_payment(&self, payment_id: i64) -> StoreResult<Option<Payment>> {
        Ok(self
            .inner
            .lock()
            .payments
            .iter()
            .find(|p| p.id == payment_id)
            .cloned())
    }

    async fn list_payments(
        &self,
        user_id: i64,
        status: Option<PaymentStatus>,
        page: Page,
    ) -> StoreResult<Paginated<Payment>> {
        let rows = self
            .inner
            .lock()
            .payments
            .iter()
            .filter(|p| p.user_id == user_id && status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn cancel_payment(&self, user_id: i64, payment_id: i64) -> StoreResult<Payment> {
        let mut tables = self.inner.lock();

        let payment = tables
            .payment_mut(payment_id)
            .filter(|p| p.user_id == user_id)
            .ok_or(StoreError::PaymentNotFound)?;

        if payment.status != PaymentStatus::Pending {
            return Err(StoreError::InvalidState {
                status: payment.status,
            });
        }

        payment.status = PaymentStatus::Cancelled;
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn fail_payment(&self, payment_id: i64) -> StoreResult<bool> {
        let mut tables = self.inner.lock();

        match tables.payment_mut(payment_id) {
            Some(payment) if payment.status == PaymentStatus::Pending => {
                payment.status = PaymentStatus::Failed;
                payment.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn settle_payment(&self, settlement: Settlement) -> StoreResult<SettleOutcome> {
        let mut tables = self.inner.lock();
        let now = Utc::now();

        let payment = tables
            .payment_mut(settlement.payment_id)
            .ok_or(StoreError::PaymentNotFound)?;

        match payment.status {
            PaymentStatus::Pending => {}
            PaymentStatus::Success => return Ok(SettleOutcome::AlreadySettled),
            status => return Ok(SettleOutcome::NotPending { status }),
        }

        payment.status = PaymentStatus::Success;
        payment.paid_at = Some(now);
        payment.updated_at = now;
        let user_id = payment.user_id;

        let wallet = tables
            .wallets
            .entry(user_id)
            .or_insert_with(|| Wallet::empty(user_id));
        wallet.balance += settlement.amount;
        wallet.total_top_up += settlement.amount;
        wallet.updated_at = now;
        let wallet = wallet.clone();

        let top_up = TopUp {
            id: tables.top_ups.len() as i64 + 1,
            user_id,
            payment_id: settlement.payment_id,
            amount: settlement.amount,
            status: PaymentStatus::Success,
            gateway: settlement.gateway,
            transaction_id: settlement.transaction_id,
            metadata: settlement.metadata,
            created_at: now,
            updated_at: now,
        };
        tables.top_ups.push(top_up);

        Ok(SettleOutcome::Credited { wallet })
    }

    async fn record_notification(
        &self,
        notification: NewNotification,
    ) -> StoreResult<IpnNotification> {
        let mut tables = self.inner.lock();

        let record = IpnNotification {
            id: tables.notifications.len() as i64 + 1,
            gateway: notification.gateway,
            notification_type: notification.notification_type,
            order_reference: notification.order_reference,
            order_status: notification.order_status,
            order_amount: notification.order_amount,
            transaction_id: notification.transaction_id,
            transaction_status: notification.transaction_status,
            transaction_amount: notification.transaction_amount,
            payment_method: notification.payment_method,
            transfer_content: notification.transfer_content,
            raw_payload: notification.raw_payload,
            payment_id: None,
            received_at: Utc::now(),
        };
        tables.notifications.push(record.clone());

        Ok(record)
    }

    async fn link_notification(&self, notification_id: i64, payment_id: i64) -> StoreResult<()> {
        let mut tables = self.inner.lock();

        if let Some(record) = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
        {
            record.payment_id = Some(payment_id);
        }

        Ok(())
    }
}
