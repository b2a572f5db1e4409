//! Callback payloads exchanged between the services.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{OrderId, UserId};

/// Sent by the reservation service after an occupy request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SlotCallback {
    /// Order the slot was requested for.
    pub order_id: OrderId,
    /// Owner of the order.
    pub user_id: UserId,
    /// Event price; meaningful only when `status` is true.
    #[serde(default)]
    pub price: i64,
    /// Whether the slot was occupied.
    pub status: bool,
}

/// Sent by the ledger after a withdrawal request.
///
/// `price` echoes the requested withdrawal sum; the orchestrator ignores it
/// but keeps it on the wire for compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentCallback {
    /// Order being paid for.
    pub order_id: OrderId,
    /// Debited user.
    pub user_id: UserId,
    /// Requested withdrawal sum.
    #[serde(default)]
    pub price: i64,
    /// Whether the debit was settled.
    pub status: bool,
}
