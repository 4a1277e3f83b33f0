//! # Loyalty engine public API
//!
//! The pipeline and the upload path never talk to a backend directly. They go through an API object that is built
//! from a backend implementing the required storage traits.
//!
//! * [`settlement_api`] drives accrual decisions and withdrawals into the store and notifies event subscribers.
//!
//! ```rust,ignore
//! use loyalty_engine::{events::EventProducers, SettlementApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/loyalty.db", 25).await?;
//! let api = SettlementApi::new(db, EventProducers::default());
//! let page = api.fetch_eligible(10, 0).await?;
//! ```
pub mod settlement_api;
