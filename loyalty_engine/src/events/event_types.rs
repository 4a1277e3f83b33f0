use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, Points};

/// Published once an accrual decision has been committed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSettledEvent {
    /// The order as it now stands in the store
    pub order: Order,
    /// The status the order had before the decision was applied
    pub previous_status: OrderStatusType,
}

impl OrderSettledEvent {
    pub fn new(order: Order, previous_status: OrderStatusType) -> Self {
        Self { order, previous_status }
    }

    /// The amount credited to the owner's balance by this settlement.
    pub fn credited(&self) -> Points {
        if self.order.status == OrderStatusType::Processed {
            self.order.accrual
        } else {
            Points::default()
        }
    }

    pub fn is_final(&self) -> bool {
        self.order.status.is_terminal()
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::db_types::OrderId;

    fn order(status: OrderStatusType, accrual: i64) -> Order {
        Order {
            id: OrderId::from("79927398713"),
            username: "alice".to_string(),
            status,
            accrual: Points::from_points(accrual),
            created_at: Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap(),
            withdrawal_id: None,
        }
    }

    #[test]
    fn only_processed_orders_credit_anything() {
        let processed = OrderSettledEvent::new(order(OrderStatusType::Processed, 500), OrderStatusType::New);
        assert!(processed.is_final());
        assert_eq!(processed.credited(), Points::from_points(500));
        let processing = OrderSettledEvent::new(order(OrderStatusType::Processing, 500), OrderStatusType::New);
        assert!(!processing.is_final());
        assert_eq!(processing.credited(), Points::default());
    }

    #[test]
    fn events_serialize_with_wire_statuses() {
        let event = OrderSettledEvent::new(order(OrderStatusType::Invalid, 0), OrderStatusType::Processing);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["previous_status"], "PROCESSING");
        assert_eq!(json["order"]["status"], "INVALID");
        assert_eq!(json["order"]["id"], "79927398713");
        let back: OrderSettledEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
