use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::{EligiblePage, SettlementError, SettlementStore},
    db_types::{NewWithdrawal, Order, OrderStatusType, Points, ResolvedOrder},
    events::{EventProducers, OrderSettledEvent},
};

/// `SettlementApi` is the entry point for everything that changes an order's status or a user's balance.
#[derive(Clone)]
pub struct SettlementApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B> SettlementApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> SettlementApi<B>
where B: SettlementStore
{
    pub async fn fetch_eligible(&self, page_size: i64, offset: i64) -> Result<EligiblePage, SettlementError> {
        self.db.fetch_eligible(page_size, offset).await
    }

    /// Applies an accrual decision to `order` and returns the order as it now stands.
    ///
    /// `accrual` is ignored unless `status` is `PROCESSED`. Subscribers to the order-settled hook are notified after
    /// the change has been committed.
    pub async fn settle(
        &self,
        order: &Order,
        status: OrderStatusType,
        accrual: Points,
    ) -> Result<Order, SettlementError> {
        let accrual = if status == OrderStatusType::Processed { accrual } else { Points::default() };
        let decision = ResolvedOrder::new(order, status, accrual);
        self.db.apply(&decision).await?;
        let mut settled = order.clone();
        settled.status = status;
        if status == OrderStatusType::Processed {
            settled.accrual = accrual;
        }
        trace!("🔄️📦️ Order {} moved from {} to {status}", order.id, order.status);
        self.call_order_settled_hook(&settled, order.status).await;
        Ok(settled)
    }

    /// Debits the user's balance and records the withdrawal. Returns the withdrawal id.
    pub async fn withdraw(&self, withdrawal: NewWithdrawal) -> Result<i64, SettlementError> {
        let id = self.db.apply_withdrawal(&withdrawal).await?;
        debug!("🔄️💸️ {} withdrew {} against order {}", withdrawal.username, withdrawal.sum, withdrawal.order_number);
        Ok(id)
    }

    async fn call_order_settled_hook(&self, order: &Order, previous_status: OrderStatusType) {
        if self.producers.order_settled_producer.is_empty() {
            return;
        }
        debug!("🔄️📦️ Notifying order settled hook subscribers");
        let event = OrderSettledEvent::new(order.clone(), previous_status);
        self.producers.publish_order_settled(event).await;
    }
}
