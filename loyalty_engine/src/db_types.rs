use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use loyalty_common::Points;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The lifecycle of an uploaded order.
///
/// `New → Processing → {Processed, Invalid}`. The last two states are terminal: once an order reaches either of them it
/// never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatusType {
    /// The order has been uploaded but the accrual service has not started on it yet.
    New,
    /// The accrual service is calculating the reward for the order.
    Processing,
    /// The order was rejected and will never earn a reward.
    Invalid,
    /// The reward has been calculated and credited to the owner.
    Processed,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::Invalid)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::New => write!(f, "NEW"),
            OrderStatusType::Processing => write!(f, "PROCESSING"),
            OrderStatusType::Invalid => write!(f, "INVALID"),
            OrderStatusType::Processed => write!(f, "PROCESSED"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The order number supplied by the user when uploading an order. Always a string of digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// The login of the user that uploaded the order
    pub username: String,
    pub status: OrderStatusType,
    /// Zero until the order is settled as `PROCESSED`
    pub accrual: Points,
    pub created_at: DateTime<Utc>,
    /// Set when the order has been used to fund a withdrawal
    pub withdrawal_id: Option<i64>,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub username: String,
    /// Eligible orders are visited in creation order, so this doubles as the queueing key.
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(id: OrderId, username: S) -> Self {
        Self { id, username: username.into(), created_at: Utc::now() }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

//--------------------------------------     ResolvedOrder      --------------------------------------------------------
/// The outcome of an accrual lookup, ready to be applied to the local order record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOrder {
    pub id: OrderId,
    /// The owner of the order. A processed order credits this user's balance.
    pub username: String,
    pub status: OrderStatusType,
    /// Only meaningful when `status` is `Processed`.
    pub accrual: Points,
}

impl ResolvedOrder {
    pub fn new(order: &Order, status: OrderStatusType, accrual: Points) -> Self {
        Self { id: order.id.clone(), username: order.username.clone(), status, accrual }
    }
}

//--------------------------------------      User balances      ------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UserBalance {
    pub current: Points,
    pub withdrawn: Points,
}

//--------------------------------------      Withdrawals      --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWithdrawal {
    pub username: String,
    /// The order the withdrawal is booked against
    pub order_number: OrderId,
    pub sum: Points,
}

impl NewWithdrawal {
    pub fn new<S: Into<String>>(username: S, order_number: OrderId, sum: Points) -> Self {
        Self { username: username.into(), order_number, sum }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: i64,
    pub username: String,
    pub order_number: OrderId,
    pub sum: Points,
    pub processed_at: DateTime<Utc>,
}
