//! The order reconciliation pipeline.
//!
//! One [`OrderProducer`] pages through the orders that still await a decision and pushes them onto a bounded queue. A
//! fixed pool of [`SettlementWorker`]s shares the receiving end of that queue, looks every order up with the accrual
//! service and applies the answer through the [`SettlementApi`]. All of them share one [`RateLimitCoordinator`], so a
//! `429` seen by any worker pauses everyone.
//!
//! Every task watches the same [`CancellationToken`]. A fatal store error in any task cancels the token, so that the
//! whole pipeline stops and [`ReconcilerHandle::wait`] returns the error.
mod producer;
mod rate_limit;
mod worker;

use std::{sync::Arc, time::Duration};

use log::*;
use loyalty_engine::{SettlementApi, SettlementStore};
pub use producer::{Cursor, OrderProducer};
pub use rate_limit::RateLimitCoordinator;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
pub use worker::{SettlementWorker, WorkQueue};

use crate::{errors::ReconcileError, integrations::accrual::AccrualLookup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub workers: usize,
    pub page_size: usize,
    pub poll_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self { workers: 3, page_size: 10, poll_interval: Duration::from_secs(1) }
    }
}

impl ReconcilerConfig {
    /// One page for every worker.
    pub fn queue_capacity(&self) -> usize {
        self.page_size.saturating_mul(self.workers).max(1)
    }
}

pub struct Reconciler<B, L> {
    api: SettlementApi<B>,
    accrual: Arc<L>,
    rate_limit: Arc<RateLimitCoordinator>,
    config: ReconcilerConfig,
}

impl<B, L> Reconciler<B, L>
where
    B: SettlementStore,
    L: AccrualLookup,
{
    pub fn new(api: SettlementApi<B>, accrual: L, config: ReconcilerConfig) -> Self {
        Self { api, accrual: Arc::new(accrual), rate_limit: Arc::new(RateLimitCoordinator::new()), config }
    }

    /// Spawns the producer and the worker pool.
    pub fn start(self, cancel: CancellationToken) -> ReconcilerHandle {
        let (sender, receiver) = mpsc::channel(self.config.queue_capacity());
        let queue: WorkQueue = Arc::new(Mutex::new(receiver));
        let mut tasks = JoinSet::new();
        let producer = OrderProducer::new(
            self.api.clone(),
            sender,
            Arc::clone(&self.rate_limit),
            self.config.page_size,
            self.config.poll_interval,
        );
        tasks.spawn(producer.run(cancel.clone()));
        let workers = self.config.workers.max(1);
        for id in 0..workers {
            let worker = SettlementWorker::new(
                id,
                self.api.clone(),
                Arc::clone(&self.accrual),
                Arc::clone(&self.rate_limit),
                Arc::clone(&queue),
            );
            tasks.spawn(worker.run(cancel.clone()));
        }
        info!("🔄️ Reconciler started with {workers} workers and a queue of {}", self.config.queue_capacity());
        ReconcilerHandle { tasks, cancel }
    }

    /// Runs the pipeline until `cancel` fires or a task fails.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ReconcileError> {
        self.start(cancel).wait().await
    }
}

/// The running pipeline.
pub struct ReconcilerHandle {
    tasks: JoinSet<Result<(), ReconcileError>>,
    cancel: CancellationToken,
}

impl ReconcilerHandle {
    /// Asks every task to stop after the order it is working on.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for every task to finish. Returns the first error any of them reported.
    pub async fn wait(mut self) -> Result<(), ReconcileError> {
        let mut first_error = None;
        while let Some(joined) = self.tasks.join_next().await {
            let result = joined.map_err(|e| ReconcileError::TaskFailed(e.to_string())).and_then(|r| r);
            let Err(e) = result else { continue };
            if first_error.is_some() {
                debug!("🔄️ Another reconciliation task failed. {e}");
                continue;
            }
            error!("🔄️ Reconciliation task failed. {e}");
            self.cancel.cancel();
            first_error = Some(e);
        }
        info!("🔄️ Reconciler stopped");
        first_error.map_or(Ok(()), Err)
    }
}
