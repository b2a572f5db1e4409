//! Order aggregate and its lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EventId, OrderId, RequestToken, UserId};

/// Lifecycle status of an [`Order`].
///
/// The happy path is a strict chain:
///
/// ```text
/// created → needs_slot → slot_held → needs_payment → paid → completed
/// ```
///
/// `cancelled` is absorbing and reachable from every state before `paid`.
/// Each status has a stable integer code used as the persisted column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Persisted, nothing requested yet.
    Created,
    /// A slot must be occupied at the reservation service.
    NeedsSlot,
    /// The reservation service confirmed the slot and the price.
    SlotHeld,
    /// The ledger must be debited for the confirmed price.
    NeedsPayment,
    /// The ledger settled the debit.
    Paid,
    /// The user was told the order is complete.
    Completed,
    /// Terminal failure state.
    Cancelled,
}

impl OrderStatus {
    /// Returns the persisted integer code.
    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            Self::Created => 0,
            Self::NeedsSlot => 1,
            Self::SlotHeld => 2,
            Self::NeedsPayment => 3,
            Self::Paid => 4,
            Self::Completed => 5,
            Self::Cancelled => -1,
        }
    }

    /// Decodes a persisted integer code.
    #[must_use]
    pub const fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Created),
            1 => Some(Self::NeedsSlot),
            2 => Some(Self::SlotHeld),
            3 => Some(Self::NeedsPayment),
            4 => Some(Self::Paid),
            5 => Some(Self::Completed),
            -1 => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns the next status on the happy path, if any.
    #[must_use]
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::NeedsSlot),
            Self::NeedsSlot => Some(Self::SlotHeld),
            Self::SlotHeld => Some(Self::NeedsPayment),
            Self::NeedsPayment => Some(Self::Paid),
            Self::Paid => Some(Self::Completed),
            Self::Completed | Self::Cancelled => None,
        }
    }

    /// `true` for statuses no event can move out of.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// `true` while the order may still be cancelled. Money has moved once
    /// the order is `paid`, so cancellation stops there.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(
            self,
            Self::Created | Self::NeedsSlot | Self::SlotHeld | Self::NeedsPayment
        )
    }

    /// Returns `true` if `next` is a legal single step from `self`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if next == Self::Cancelled {
            return self.is_cancellable();
        }
        self.successor() == Some(next)
    }

    /// Snake-case name, as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::NeedsSlot => "needs_slot",
            Self::SlotHeld => "slot_held",
            Self::NeedsPayment => "needs_payment",
            Self::Paid => "paid",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A booking order.
///
/// Mutated only by the orchestrator and never deleted. `price` is zero until
/// the reservation service confirms it and is authoritative only from
/// `slot_held` onwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    /// Order identifier.
    pub id: OrderId,
    /// Owning user.
    pub user_id: UserId,
    /// Event the user wants a slot in.
    pub event_id: EventId,
    /// Agreed price in the smallest currency unit.
    pub price: i64,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Ledger token of the outstanding payment, once one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub ledger_token: Option<RequestToken>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last status change.
    pub updated_at: DateTime<Utc>,
}
