use std::{sync::Arc, time::Duration};

use log::*;
use loyalty_engine::{db_types::Order, EligiblePage, SettlementApi, SettlementStore};
use tokio::{
    sync::mpsc,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{errors::ReconcileError, reconciler::rate_limit::RateLimitCoordinator};

/// The producer's position in the backlog of eligible orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    offset: i64,
}

impl Cursor {
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Moves the cursor past `page`. Returns true if that finished a pass over the backlog, in which case the cursor
    /// is back at the start.
    pub fn advance(&mut self, page: &EligiblePage) -> bool {
        let next = page.offset.saturating_add(i64::try_from(page.len()).unwrap_or(i64::MAX));
        if page.is_empty() || next >= page.total {
            self.offset = 0;
            true
        } else {
            self.offset = next;
            false
        }
    }
}

/// Walks the eligible orders page by page and feeds them to the workers.
pub struct OrderProducer<B> {
    api: SettlementApi<B>,
    queue: mpsc::Sender<Order>,
    rate_limit: Arc<RateLimitCoordinator>,
    page_size: i64,
    poll_interval: Duration,
    cursor: Cursor,
}

impl<B> OrderProducer<B>
where B: SettlementStore
{
    pub fn new(
        api: SettlementApi<B>,
        queue: mpsc::Sender<Order>,
        rate_limit: Arc<RateLimitCoordinator>,
        page_size: usize,
        poll_interval: Duration,
    ) -> Self {
        let page_size = i64::try_from(page_size.max(1)).unwrap_or(i64::MAX);
        let poll_interval = poll_interval.max(Duration::from_millis(1));
        Self { api, queue, rate_limit, page_size, poll_interval, cursor: Cursor::default() }
    }

    /// Feeds the queue until `cancel` fires or the workers have all gone away.
    ///
    /// Pages are fetched back to back while a pass is in progress; the full queue is the only throttle. Once a pass
    /// is complete, the producer rests until the next tick of the poll interval.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), ReconcileError> {
        info!("🔄️ Order producer started. Page size {}, poll interval {:?}", self.page_size, self.poll_interval);
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a fresh interval completes immediately
        ticker.reset();
        loop {
            if !self.rate_limit.wait_if_paused(&cancel).await {
                break;
            }
            let fetched = tokio::select! {
                _ = cancel.cancelled() => break,
                page = self.api.fetch_eligible(self.page_size, self.cursor.offset()) => page,
            };
            let pass_complete = match fetched {
                Ok(page) => {
                    let pass_complete = self.cursor.advance(&page);
                    trace!(
                        "🔄️ Queueing {} of {} eligible orders from offset {}",
                        page.len(),
                        page.total,
                        page.offset
                    );
                    if !self.enqueue(page.orders, &cancel).await {
                        break;
                    }
                    pass_complete
                },
                Err(e) if e.is_fatal() => {
                    error!("🔄️ Could not fetch eligible orders: {e}. Stopping the pipeline");
                    cancel.cancel();
                    return Err(e.into());
                },
                Err(e) => {
                    warn!("🔄️ Could not fetch eligible orders: {e}. Trying again on the next tick");
                    true
                },
            };
            if pass_complete {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {},
                }
            }
        }
        info!("🔄️ Order producer stopped");
        Ok(())
    }

    /// Returns false if the producer should stop.
    async fn enqueue(&self, orders: Vec<Order>, cancel: &CancellationToken) -> bool {
        for order in orders {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                sent = self.queue.send(order) => {
                    if sent.is_err() {
                        debug!("🔄️ The work queue has closed");
                        return false;
                    }
                },
            }
        }
        true
    }
}
