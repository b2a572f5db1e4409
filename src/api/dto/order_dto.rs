//! Order endpoint DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{EventId, OrderId, OrderStatus};

/// Request body for `POST /orders/create`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Event to book a slot for.
    pub event_id: EventId,
}

/// Response body for `POST /orders/create`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResponse {
    /// Identifier of the new order.
    pub order_id: OrderId,
}

/// Acknowledgement of a callback: where the order stands after it was
/// applied.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CallbackAck {
    /// Order the callback referred to.
    pub order_id: OrderId,
    /// Status after processing.
    pub status: OrderStatus,
}
