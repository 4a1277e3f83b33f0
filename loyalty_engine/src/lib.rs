//! Loyalty Engine
//!
//! The loyalty engine holds the ledger behind the loyalty points service: users, the orders they upload, and the
//! withdrawals they make. It is the persistence side of the order reconciliation pipeline.
//!
//! The library is divided into these main sections:
//! 1. Storage contracts and backends. The [`SettlementStore`] trait is the narrow boundary that the
//!    reconciliation pipeline works through. SQLite is the supported backend. The data types stored in the database
//!    are defined in [`db_types`].
//! 2. The public API. [`SettlementApi`] wraps a backend and is what the pipeline and the upload
//!    path actually call.
//! 3. A [`retry`] policy for connection-level database failures. Every mutating store operation is retried as a whole
//!    transaction under this policy.
//!
//! The engine also emits events that can be subscribed to. An [`events::OrderSettledEvent`] is published whenever an
//! accrual decision has been committed.
mod db;

pub mod db_types;
pub mod events;
pub mod retry;

mod ledger_api;

#[cfg(feature = "test_utils")]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use db::traits::{is_connection_exception, AccountManagement, EligiblePage, SettlementError, SettlementStore};
pub use ledger_api::settlement_api::SettlementApi;
