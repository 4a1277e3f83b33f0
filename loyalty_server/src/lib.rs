//! # Loyalty reconciliation server
//!
//! This crate hosts the long-running process that keeps local orders in step with the accrual service. It is
//! responsible for:
//! * Paging through orders that have not reached a final status.
//! * Looking each of them up with the accrual service, backing off when the service rate limits us.
//! * Settling orders that have moved on, crediting the owner's balance exactly once.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
pub mod cli;
pub mod config;
pub mod errors;
pub mod integrations;
pub mod reconciler;
pub mod server;
