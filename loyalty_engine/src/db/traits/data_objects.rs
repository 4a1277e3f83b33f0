use serde::{Deserialize, Serialize};

use crate::db_types::Order;

/// One page of orders that still need a decision from the accrual service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligiblePage {
    /// The orders on this page, oldest first
    pub orders: Vec<Order>,
    /// The offset this page was actually read from. This is zero if the requested offset had run past the end.
    pub offset: i64,
    /// The number of eligible orders in the whole store when the page was read
    pub total: i64,
}

impl EligiblePage {
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }
}
