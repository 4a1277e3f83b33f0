//! Client for the external accrual authority.
//!
//! The authority owns the final word on an order's status and the number of points it earns. [`AccrualApi`] performs a
//! single lookup per call and classifies the HTTP response into a [`LookupOutcome`]; it never retries on its own.
mod api;
mod config;
mod error;

mod data_objects;
pub mod helpers;

pub use api::AccrualApi;
pub use config::AccrualConfig;
pub use data_objects::{AccrualOrder, AccrualStatus, LookupOutcome};
pub use error::AccrualApiError;
