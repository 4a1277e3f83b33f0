use crate::{
    db::traits::SettlementError,
    db_types::{NewOrder, Order, OrderId, UserBalance, Withdrawal},
};

/// The `AccountManagement` trait covers the user and order records that feed the reconciliation pipeline.
///
/// Users and orders are created by the upload path. The pipeline only ever reads them through [`SettlementStore`].
/// Insert-style methods are idempotent and retried on connection failures in the same way as settlements.
///
/// [`SettlementStore`]: crate::SettlementStore
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    /// Creates a user with a zero balance. Returns `false` if the login is already taken.
    async fn insert_user(&self, login: &str, password_hash: &str) -> Result<bool, SettlementError>;

    /// Stores a new order in the `NEW` state. Returns `false` if an order with the same number already exists,
    /// whoever it belongs to.
    async fn insert_order(&self, order: NewOrder) -> Result<bool, SettlementError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, SettlementError>;

    /// All orders uploaded by `login`, newest first.
    async fn fetch_orders_for_user(&self, login: &str) -> Result<Vec<Order>, SettlementError>;

    async fn fetch_balance(&self, login: &str) -> Result<UserBalance, SettlementError>;

    /// All withdrawals made by `login`, oldest first.
    async fn fetch_withdrawals_for_user(&self, login: &str) -> Result<Vec<Withdrawal>, SettlementError>;

    async fn fetch_password_hash(&self, login: &str) -> Result<Option<String>, SettlementError>;
}
