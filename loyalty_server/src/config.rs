use std::{env, time::Duration};

use accrual_tools::AccrualConfig;
use log::*;
use loyalty_common::helpers::{env_flag, env_millis, env_or_default, env_secs};
use loyalty_engine::retry::RetryPolicy;

use crate::reconciler::ReconcilerConfig;

const DEFAULT_LPS_DATABASE_URL: &str = "sqlite://data/loyalty.db";
const DEFAULT_WORKERS: usize = 3;
const DEFAULT_PAGE_SIZE: usize = 10;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
const DEFAULT_DB_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_DB_RETRY_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(25);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub accrual: AccrualConfig,
    /// The number of settlement workers looking up orders concurrently.
    pub workers: usize,
    /// The number of eligible orders fetched from the store in one go.
    pub page_size: usize,
    /// How long the producer rests after it has walked the whole backlog.
    pub poll_interval: Duration,
    /// Retry policy for mutating store operations.
    pub db_retry: RetryPolicy,
    pub db_max_connections: u32,
    /// If true, the schema is brought up to date at startup.
    pub run_migrations: bool,
    /// How long in-flight orders are given to finish after a shutdown has been requested.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_LPS_DATABASE_URL.to_string(),
            accrual: AccrualConfig::default(),
            workers: DEFAULT_WORKERS,
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            db_retry: RetryPolicy::fixed(DEFAULT_DB_RETRY_ATTEMPTS, DEFAULT_DB_RETRY_DELAY),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            run_migrations: true,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("LPS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ LPS_DATABASE_URL is not set. Using {DEFAULT_LPS_DATABASE_URL} instead.");
            DEFAULT_LPS_DATABASE_URL.to_string()
        });
        let accrual = AccrualConfig::new_from_env_or_default();
        let workers = at_least_one("LPS_WORKERS", env_or_default("LPS_WORKERS", DEFAULT_WORKERS), DEFAULT_WORKERS);
        let page_size =
            at_least_one("LPS_PAGE_SIZE", env_or_default("LPS_PAGE_SIZE", DEFAULT_PAGE_SIZE), DEFAULT_PAGE_SIZE);
        let poll_interval = env_millis("LPS_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL);
        let poll_interval = if poll_interval.is_zero() {
            error!("🪛️ LPS_POLL_INTERVAL_MS must be positive. Using the default, {DEFAULT_POLL_INTERVAL:?}, instead.");
            DEFAULT_POLL_INTERVAL
        } else {
            poll_interval
        };
        let attempts = at_least_one(
            "LPS_DB_RETRY_ATTEMPTS",
            env_or_default("LPS_DB_RETRY_ATTEMPTS", DEFAULT_DB_RETRY_ATTEMPTS),
            DEFAULT_DB_RETRY_ATTEMPTS,
        );
        let delay = env_millis("LPS_DB_RETRY_DELAY_MS", DEFAULT_DB_RETRY_DELAY);
        let db_max_connections = at_least_one(
            "LPS_DB_MAX_CONNECTIONS",
            env_or_default("LPS_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            DEFAULT_DB_MAX_CONNECTIONS,
        );
        let run_migrations = env_flag("LPS_RUN_MIGRATIONS", true);
        let shutdown_timeout = env_secs("LPS_SHUTDOWN_TIMEOUT_SECS", DEFAULT_SHUTDOWN_TIMEOUT);
        Self {
            database_url,
            accrual,
            workers,
            page_size,
            poll_interval,
            db_retry: RetryPolicy::fixed(attempts, delay),
            db_max_connections,
            run_migrations,
            shutdown_timeout,
        }
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig { workers: self.workers, page_size: self.page_size, poll_interval: self.poll_interval }
    }
}

fn at_least_one<T>(name: &str, value: T, default: T) -> T
where T: PartialOrd + From<u8> + std::fmt::Display {
    if value < T::from(1u8) {
        error!("🪛️ {name} must be at least 1, but was {value}. Using the default, {default}, instead.");
        default
    } else {
        value
    }
}
