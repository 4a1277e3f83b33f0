//! `SqliteDatabase` is the SQLite implementation of the settlement store.
//!
//! It implements both [`SettlementStore`] and [`AccountManagement`]. Every mutating operation runs inside its own
//! transaction, and the whole transaction is retried under the configured [`RetryPolicy`] if the database reports a
//! connection-level failure.
use std::{fmt::Debug, future::Future};

use log::*;
use sqlx::SqlitePool;

use super::{new_pool, orders, user_accounts, withdrawals};
use crate::{
    db::traits::{AccountManagement, EligiblePage, SettlementError, SettlementStore},
    db_types::{NewOrder, NewWithdrawal, Order, OrderId, OrderStatusType, ResolvedOrder, UserBalance, Withdrawal},
    retry::{retry_with_policy, RetryError, RetryPolicy},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    retry_policy: RetryPolicy,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SettlementStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_eligible(&self, page_size: i64, offset: i64) -> Result<EligiblePage, SettlementError> {
        // The count and the page are read in one transaction so that they describe the same snapshot.
        let mut tx = self.pool.begin().await?;
        let total = orders::count_eligible(&mut tx).await?;
        let offset = if offset < 0 || offset >= total { 0 } else { offset };
        let orders = orders::fetch_eligible(page_size, offset, &mut tx).await?;
        tx.commit().await?;
        trace!("🗃️ Fetched {} eligible orders from offset {offset}. {total} eligible in total", orders.len());
        Ok(EligiblePage { orders, offset, total })
    }

    async fn apply(&self, order: &ResolvedOrder) -> Result<(), SettlementError> {
        self.with_retry("apply", || self.apply_once(order)).await
    }

    async fn apply_withdrawal(&self, withdrawal: &NewWithdrawal) -> Result<i64, SettlementError> {
        if withdrawal.sum.value() <= 0 {
            return Err(SettlementError::InvalidWithdrawal(format!(
                "the sum must be positive, but {} was requested",
                withdrawal.sum
            )));
        }
        self.with_retry("apply_withdrawal", || self.apply_withdrawal_once(withdrawal)).await
    }
}

impl AccountManagement for SqliteDatabase {
    async fn insert_user(&self, login: &str, password_hash: &str) -> Result<bool, SettlementError> {
        self.with_retry("insert_user", || async {
            let mut conn = self.pool.acquire().await?;
            let inserted = user_accounts::idempotent_insert(login, password_hash, &mut conn).await?;
            Ok(inserted)
        })
        .await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<bool, SettlementError> {
        self.with_retry("insert_order", || async {
            let mut conn = self.pool.acquire().await?;
            let inserted = orders::idempotent_insert(order.clone(), &mut conn).await?;
            Ok(inserted)
        })
        .await
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_user(&self, login: &str) -> Result<Vec<Order>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_user(login, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_balance(&self, login: &str) -> Result<UserBalance, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        user_accounts::fetch_balance(login, &mut conn)
            .await?
            .ok_or_else(|| SettlementError::AccountNotFound(login.to_string()))
    }

    async fn fetch_withdrawals_for_user(&self, login: &str) -> Result<Vec<Withdrawal>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let withdrawals = withdrawals::fetch_withdrawals_for_user(login, &mut conn).await?;
        Ok(withdrawals)
    }

    async fn fetch_password_hash(&self, login: &str) -> Result<Option<String>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let hash = user_accounts::fetch_password_hash(login, &mut conn).await?;
        Ok(hash)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SettlementError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool, retry_policy: RetryPolicy::default() })
    }

    /// Replaces the default retry policy (3 attempts, 500ms apart).
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), SettlementError> {
        sqlx::migrate!("./src/db/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SettlementError::DatabaseError(format!("Could not run migrations: {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Closes the pool. In-flight queries are allowed to finish. Every later call fails with
    /// [`SettlementError::PoolClosed`].
    pub async fn close(&self) {
        self.pool.close().await;
        info!("🗃️ Database connection pool closed");
    }

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T, SettlementError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SettlementError>>,
    {
        retry_with_policy(&self.retry_policy, operation, SettlementError::is_transient, op).await.map_err(|e| match e {
            RetryError::Aborted(e) => e,
            RetryError::Exhausted { attempts, last } => {
                SettlementError::RetriesExhausted { operation: operation.to_string(), attempts, last: last.to_string() }
            },
        })
    }

    async fn apply_once(&self, order: &ResolvedOrder) -> Result<(), SettlementError> {
        let mut tx = self.pool.begin().await?;
        if order.status == OrderStatusType::Processed {
            let affected = orders::mark_processed(&order.id, &order.username, order.accrual, &mut tx).await?;
            expect_one_row("mark_processed", affected)?;
            let affected = user_accounts::credit_balance(&order.username, order.accrual, &mut tx).await?;
            expect_one_row("credit_balance", affected)?;
            tx.commit().await?;
            info!("🗃️ Order {} settled. {} credited to {}", order.id, order.accrual, order.username);
        } else {
            let affected = orders::update_status(&order.id, &order.username, order.status, &mut tx).await?;
            expect_one_row("update_status", affected)?;
            tx.commit().await?;
            debug!("🗃️ Order {} is now {}", order.id, order.status);
        }
        Ok(())
    }

    async fn apply_withdrawal_once(&self, withdrawal: &NewWithdrawal) -> Result<i64, SettlementError> {
        let NewWithdrawal { username, order_number, sum } = withdrawal;
        let mut tx = self.pool.begin().await?;
        let affected = user_accounts::debit_balance(username, *sum, &mut tx).await?;
        if affected != 1 {
            let balance = user_accounts::fetch_balance(username, &mut tx)
                .await?
                .ok_or_else(|| SettlementError::AccountNotFound(username.clone()))?;
            return Err(SettlementError::InsufficientFunds { requested: *sum, available: balance.current });
        }
        let id = withdrawals::insert_withdrawal(withdrawal, &mut tx).await?;
        let affected = orders::link_withdrawal(order_number, id, &mut tx).await?;
        if affected != 1 {
            return Err(SettlementError::OrderNotFound(order_number.clone()));
        }
        tx.commit().await?;
        info!("🗃️ Withdrawal #{id} of {sum} for {username} booked against order {order_number}");
        Ok(id)
    }
}

fn expect_one_row(operation: &'static str, affected: u64) -> Result<(), SettlementError> {
    if affected == 1 {
        Ok(())
    } else {
        warn!("🗃️ {operation} affected {affected} rows. Rolling back");
        Err(SettlementError::RowCountMismatch { operation, affected })
    }
}
