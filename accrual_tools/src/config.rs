use std::time::Duration;

use log::*;
use loyalty_common::helpers::env_secs;

const DEFAULT_ACCRUAL_ADDRESS: &str = "http://127.0.0.1:8080";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct AccrualConfig {
    /// Scheme, host and port of the accrual service, e.g. `http://accrual.local:8080`.
    pub base_url: String,
    /// Upper bound on a single lookup, including connecting and reading the body.
    pub request_timeout: Duration,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_ACCRUAL_ADDRESS.to_string(), request_timeout: DEFAULT_REQUEST_TIMEOUT }
    }
}

impl AccrualConfig {
    pub fn new(base_url: &str) -> Self {
        Self { base_url: base_url.to_string(), ..Default::default() }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reads `LPS_ACCRUAL_SYSTEM_ADDRESS` and `LPS_LOOKUP_TIMEOUT_SECS`.
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("LPS_ACCRUAL_SYSTEM_ADDRESS").unwrap_or_else(|_| {
            warn!("🪛️ LPS_ACCRUAL_SYSTEM_ADDRESS not set, using {DEFAULT_ACCRUAL_ADDRESS} as default");
            DEFAULT_ACCRUAL_ADDRESS.to_string()
        });
        let request_timeout = env_secs("LPS_LOOKUP_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT);
        Self { base_url, request_timeout }
    }
}
