//! Glue between the accrual client and the settlement pipeline.
use std::future::Future;

use accrual_tools::{AccrualApi, AccrualApiError, AccrualStatus, LookupOutcome};
use loyalty_engine::db_types::{OrderId, OrderStatusType};

/// A single status lookup against the accrual authority.
///
/// Workers only depend on this trait, so that the pipeline can be driven by something other than a live HTTP service.
pub trait AccrualLookup: Send + Sync + 'static {
    fn lookup(&self, order_id: &OrderId) -> impl Future<Output = Result<LookupOutcome, AccrualApiError>> + Send;
}

impl AccrualLookup for AccrualApi {
    async fn lookup(&self, order_id: &OrderId) -> Result<LookupOutcome, AccrualApiError> {
        AccrualApi::lookup(self, order_id.as_str()).await
    }
}

/// Maps the authority's view of an order onto the local status. A `REGISTERED` order has not been looked at yet, so it
/// is still `NEW` locally.
pub fn local_status(status: AccrualStatus) -> OrderStatusType {
    match status {
        AccrualStatus::Registered => OrderStatusType::New,
        AccrualStatus::Processing => OrderStatusType::Processing,
        AccrualStatus::Invalid => OrderStatusType::Invalid,
        AccrualStatus::Processed => OrderStatusType::Processed,
    }
}
