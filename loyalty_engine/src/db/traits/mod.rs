//! # Storage contracts
//!
//! This module defines the behaviour that a storage backend must expose in order to drive the reconciliation
//! pipeline.
//!
//! * [`SettlementStore`] is the narrow interface the pipeline itself uses: fetch the orders that still need a
//!   decision, apply a decision, and apply a withdrawal.
//! * [`AccountManagement`] manages the user and order records that the pipeline works on.
mod account_management;
mod data_objects;
mod settlement_store;

pub use account_management::AccountManagement;
pub use data_objects::EligiblePage;
pub use settlement_store::{is_connection_exception, SettlementError, SettlementStore};
