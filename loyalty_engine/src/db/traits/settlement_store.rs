use std::future::Future;

use loyalty_common::Points;
use thiserror::Error;

use crate::{
    db::traits::data_objects::EligiblePage,
    db_types::{NewWithdrawal, OrderId, ResolvedOrder},
};

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),
    #[error("The database connection pool has been closed")]
    PoolClosed,
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("{operation} affected {affected} rows, but exactly one was expected")]
    RowCountMismatch { operation: &'static str, affected: u64 },
    #[error("{operation} failed after {attempts} attempts. Last error: {last}")]
    RetriesExhausted { operation: String, attempts: u32, last: String },
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("User account {0} does not exist")]
    AccountNotFound(String),
    #[error("Insufficient funds. {requested} was requested, but only {available} is available")]
    InsufficientFunds { requested: Points, available: Points },
    #[error("Invalid withdrawal: {0}")]
    InvalidWithdrawal(String),
}

impl SettlementError {
    /// Connection-level failures. The same operation may well succeed if it is simply tried again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }

    /// Errors that mean the store is no longer usable. The pipeline shuts down when it sees one of these.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PoolClosed | Self::RetriesExhausted { .. })
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolClosed => SettlementError::PoolClosed,
            e if is_connection_exception(&e) => SettlementError::ConnectionError(e.to_string()),
            e => SettlementError::DatabaseError(e.to_string()),
        }
    }
}

/// Returns true if `e` is a connection-level failure rather than a problem with the statement itself.
///
/// For database-reported errors, SQLSTATE class `08` (connection exception) is recognised, as are SQLite's `BUSY` and
/// `LOCKED` result codes, including their extended variants.
pub fn is_connection_exception(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db_err) => db_err.code().map(|code| is_connection_error_code(&code)).unwrap_or(false),
        _ => false,
    }
}

fn is_connection_error_code(code: &str) -> bool {
    const SQLITE_BUSY: i64 = 5;
    const SQLITE_LOCKED: i64 = 6;
    if code.starts_with("08") {
        return true;
    }
    // SQLite reports extended result codes. The primary code lives in the low byte.
    code.parse::<i64>().map(|c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED)).unwrap_or(false)
}

/// The persistence boundary of the reconciliation pipeline.
///
/// Every mutating method is atomic: either all of its statements commit, or none of them do. Implementations are
/// shared between the producer and every worker task, so all futures must be `Send`.
pub trait SettlementStore: Clone + Send + Sync + 'static {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Fetches up to `page_size` orders that are not yet `PROCESSED` or `INVALID`, oldest first, skipping the first
    /// `offset` of them. The page also carries the total number of eligible orders.
    ///
    /// If `offset` is at or beyond the total, the page is read from the start instead.
    fn fetch_eligible(
        &self,
        page_size: i64,
        offset: i64,
    ) -> impl Future<Output = Result<EligiblePage, SettlementError>> + Send;

    /// Writes the outcome of an accrual lookup to the order.
    ///
    /// For a `PROCESSED` order, the status and accrual are updated and the accrual is credited to the owner's balance
    /// in the same transaction. For any other status, only the status is updated. An order that is already terminal
    /// is never touched and results in [`SettlementError::RowCountMismatch`].
    fn apply(&self, order: &ResolvedOrder) -> impl Future<Output = Result<(), SettlementError>> + Send;

    /// Records a withdrawal, debits the user's balance, and links the referenced order to the new withdrawal in one
    /// transaction. Returns the id of the new withdrawal.
    ///
    /// The balance can never go negative. If it would, [`SettlementError::InsufficientFunds`] is returned and nothing
    /// is written.
    fn apply_withdrawal(&self, withdrawal: &NewWithdrawal) -> impl Future<Output = Result<i64, SettlementError>> + Send;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn connection_codes() {
        assert!(is_connection_error_code("08006"));
        assert!(is_connection_error_code("08001"));
        assert!(is_connection_error_code("5"));
        assert!(is_connection_error_code("517"));
        assert!(is_connection_error_code("6"));
        assert!(is_connection_error_code("262"));
        assert!(!is_connection_error_code("19"));
        assert!(!is_connection_error_code("2067"));
        assert!(!is_connection_error_code("23505"));
    }

    #[test]
    fn classification() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(SettlementError::from(sqlx::Error::Io(io)).is_transient());
        assert!(SettlementError::from(sqlx::Error::PoolTimedOut).is_transient());
        let closed = SettlementError::from(sqlx::Error::PoolClosed);
        assert!(!closed.is_transient());
        assert!(closed.is_fatal());
        let missing = SettlementError::from(sqlx::Error::RowNotFound);
        assert!(!missing.is_transient());
        assert!(!missing.is_fatal());
        let mismatch = SettlementError::RowCountMismatch { operation: "update_status", affected: 0 };
        assert!(!mismatch.is_transient());
        assert!(!mismatch.is_fatal());
    }
}
