use std::{fmt::Display, time::Duration};

use loyalty_common::Points;
use serde::{Deserialize, Serialize};

/// The status of an order, as reported by the accrual authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    /// The authority knows about the order but has not started calculating the reward.
    Registered,
    /// The reward calculation is in progress.
    Processing,
    /// The order does not qualify for a reward. Terminal.
    Invalid,
    /// The reward has been calculated. Terminal.
    Processed,
}

impl AccrualStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }
}

impl Display for AccrualStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registered => write!(f, "REGISTERED"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Invalid => write!(f, "INVALID"),
            Self::Processed => write!(f, "PROCESSED"),
        }
    }
}

/// Body of a `200 OK` lookup response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccrualOrder {
    pub order: String,
    pub status: AccrualStatus,
    /// Only present once the order is `PROCESSED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Points>,
}

impl AccrualOrder {
    pub fn accrual_or_zero(&self) -> Points {
        self.accrual.unwrap_or_default()
    }
}

/// Every non-error answer the accrual service can give to a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The service returned the current status of the order.
    Resolved(AccrualOrder),
    /// `204 No Content`: the order has not been registered with the service yet.
    NotRegistered,
    /// `429 Too Many Requests`: no further lookups should be made until the cool-down has passed.
    RateLimited(Duration),
}
