//! Orders placed against catalog records.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{OrderId, RecordId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of an order.
///
/// Orders are created as `Pending`; no transitions happen inside this
/// backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::validation(
                "status",
                format!("unknown order status '{other}'"),
            )),
        }
    }
}

/// An order for a quantity of a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub record_id: RecordId,
    pub quantity: u32,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order.
    pub fn pending(record_id: RecordId, quantity: u32) -> Self {
        Self {
            id: OrderId::new(),
            record_id,
            quantity,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        }
    }
}
