use std::sync::Arc;

use accrual_tools::{AccrualOrder, LookupOutcome};
use log::*;
use loyalty_engine::{
    db_types::{Order, OrderStatusType},
    SettlementApi,
    SettlementError,
    SettlementStore,
};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::ReconcileError,
    integrations::accrual::{local_status, AccrualLookup},
    reconciler::rate_limit::RateLimitCoordinator,
};

pub type WorkQueue = Arc<Mutex<mpsc::Receiver<Order>>>;

/// Takes orders off the shared queue, asks the accrual service about them, and settles the ones that have moved on.
pub struct SettlementWorker<B, L> {
    id: usize,
    api: SettlementApi<B>,
    accrual: Arc<L>,
    rate_limit: Arc<RateLimitCoordinator>,
    queue: WorkQueue,
}

impl<B, L> SettlementWorker<B, L>
where
    B: SettlementStore,
    L: AccrualLookup,
{
    pub fn new(
        id: usize,
        api: SettlementApi<B>,
        accrual: Arc<L>,
        rate_limit: Arc<RateLimitCoordinator>,
        queue: WorkQueue,
    ) -> Self {
        Self { id, api, accrual, rate_limit, queue }
    }

    /// Processes orders until `cancel` fires or the queue closes.
    ///
    /// Cancellation is only observed between orders. On a fatal store error the worker cancels `cancel` itself, so
    /// that the rest of the pipeline winds down too.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ReconcileError> {
        debug!("🔄️ Settlement worker {} started", self.id);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                order = next_order(&self.queue) => order,
            };
            let Some(order) = next else {
                debug!("🔄️ Work queue closed. Worker {} is done", self.id);
                break;
            };
            if let Err(e) = self.process(&order, &cancel).await {
                error!("🔄️ Worker {} failed on order {}: {e}. Stopping the pipeline", self.id, order.id);
                cancel.cancel();
                return Err(e);
            }
        }
        debug!("🔄️ Settlement worker {} stopped", self.id);
        Ok(())
    }

    /// Looks up a single order and acts on the answer. Only errors that should stop the pipeline are returned.
    /// Everything else is logged and the order is left for the next pass.
    pub async fn process(&self, order: &Order, cancel: &CancellationToken) -> Result<(), ReconcileError> {
        if !self.rate_limit.wait_if_paused(cancel).await {
            trace!("🔄️ Shutdown requested before order {} was looked up", order.id);
            return Ok(());
        }
        let outcome = match self.accrual.lookup(&order.id).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_transport() => {
                warn!("🔄️ Could not reach the accrual service for order {}. {e}", order.id);
                return Ok(());
            },
            Err(e) => {
                warn!("🔄️ Bad answer from the accrual service for order {}. {e}", order.id);
                return Ok(());
            },
        };
        match outcome {
            LookupOutcome::Resolved(resolved) => self.settle(order, &resolved).await,
            LookupOutcome::NotRegistered => {
                debug!("🔄️ Order {} is not registered with the accrual service yet", order.id);
                Ok(())
            },
            LookupOutcome::RateLimited(pause) => {
                self.rate_limit.record_pause(pause);
                Ok(())
            },
        }
    }

    async fn settle(&self, order: &Order, resolved: &AccrualOrder) -> Result<(), ReconcileError> {
        let status = local_status(resolved.status);
        let regression = status == OrderStatusType::New && order.status == OrderStatusType::Processing;
        if status == order.status || regression {
            trace!("🔄️ Order {} is still {}. Nothing to do", order.id, order.status);
            return Ok(());
        }
        match self.api.settle(order, status, resolved.accrual_or_zero()).await {
            Ok(settled) => {
                debug!("🔄️ Worker {} moved order {} to {}", self.id, settled.id, settled.status);
                Ok(())
            },
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e @ SettlementError::RowCountMismatch { .. }) => {
                // Usually a duplicate in the queue that another worker has already settled
                warn!("🔄️ Order {} was not settled. {e}", order.id);
                Ok(())
            },
            Err(e) => {
                warn!("🔄️ Could not settle order {}. {e}. It will be retried on the next pass", order.id);
                Ok(())
            },
        }
    }
}

async fn next_order(queue: &Mutex<mpsc::Receiver<Order>>) -> Option<Order> {
    queue.lock().await.recv().await
}
