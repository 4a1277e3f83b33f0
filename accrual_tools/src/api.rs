use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, RETRY_AFTER},
    Client,
    Response,
    StatusCode,
};

use crate::{
    config::AccrualConfig,
    data_objects::{AccrualOrder, LookupOutcome},
    helpers::parse_retry_after,
    AccrualApiError,
};

#[derive(Clone)]
pub struct AccrualApi {
    config: AccrualConfig,
    client: Arc<Client>,
}

impl AccrualApi {
    pub fn new(config: AccrualConfig) -> Result<Self, AccrualApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AccrualApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, order_id: &str) -> String {
        format!("{}/api/orders/{order_id}", self.config.base_url.trim_end_matches('/'))
    }

    /// Asks the accrual service for the current status of `order_id`.
    ///
    /// The response is always consumed or dropped before this method returns, whatever the outcome.
    pub async fn lookup(&self, order_id: &str) -> Result<LookupOutcome, AccrualApiError> {
        let url = self.url(order_id);
        trace!("🌐️ Looking up order {order_id}: GET {url}");
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AccrualApiError::Timeout(e.to_string())
            } else {
                AccrualApiError::Transport(e.to_string())
            }
        })?;
        let outcome = classify_response(order_id, response).await?;
        debug!("🌐️ Lookup for order {order_id} returned {outcome:?}");
        Ok(outcome)
    }
}

async fn classify_response(order_id: &str, response: Response) -> Result<LookupOutcome, AccrualApiError> {
    match response.status() {
        StatusCode::OK => {
            let order = response.json::<AccrualOrder>().await.map_err(|e| AccrualApiError::JsonError(e.to_string()))?;
            if order.order != order_id {
                return Err(AccrualApiError::MalformedResponse(format!(
                    "asked for order {order_id}, but the response describes order {}",
                    order.order
                )));
            }
            Ok(LookupOutcome::Resolved(order))
        },
        StatusCode::NO_CONTENT => Ok(LookupOutcome::NotRegistered),
        StatusCode::TOO_MANY_REQUESTS => {
            let delay = parse_retry_after(response.headers().get(RETRY_AFTER))?;
            warn!("🌐️ The accrual service is rate limiting us. Retry after {}s", delay.as_secs());
            Ok(LookupOutcome::RateLimited(delay))
        },
        status => {
            let message = response.text().await.unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            Err(AccrualApiError::UnexpectedStatus { status: status.as_u16(), message })
        },
    }
}
