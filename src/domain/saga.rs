//! Order fulfillment saga as a pure transition table.
//!
//! [`decide`] maps the persisted [`OrderStatus`] and an incoming
//! [`SagaEvent`] to a [`Step`]: the status to compare-and-swap into, and the
//! side effects to run once that swap has won. It performs no I/O; the
//! orchestrator in [`crate::service::orchestrator`] is the only driver.
//!
//! | status        | event                              | next          | actions                          |
//! |---------------|------------------------------------|---------------|----------------------------------|
//! | created       | advance                            | needs_slot    | (follow up)                      |
//! | needs_slot    | advance                            | –             | occupy slot                      |
//! | needs_slot    | slot reserved                      | slot_held     | (follow up)                      |
//! | needs_slot    | slot rejected / call failed        | cancelled     | notify                           |
//! | slot_held     | advance                            | needs_payment | (follow up)                      |
//! | needs_payment | advance                            | –             | request payment                  |
//! | needs_payment | payment settled                    | paid          | (follow up)                      |
//! | needs_payment | payment rejected / call failed     | cancelled     | notify, cancel slot              |
//! | paid          | advance                            | completed     | notify                           |
//!
//! Every other pair is stale (a duplicate or late callback) and yields an
//! empty step.

use super::OrderStatus;

/// Input to the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaEvent {
    /// Re-derive the next action from the persisted status.
    Advance,
    /// Reservation service confirmed the slot at this price.
    SlotReserved {
        /// Confirmed price in the smallest currency unit.
        price: i64,
    },
    /// Reservation service reported the slot could not be occupied.
    SlotRejected,
    /// The occupy call itself failed.
    SlotCallFailed,
    /// Ledger reported the debit as settled.
    PaymentSettled,
    /// Ledger reported the debit as rejected.
    PaymentRejected,
    /// The payment request itself failed.
    PaymentCallFailed,
}

/// User-facing notice sent through the notification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The slot could not be reserved.
    SlotUnavailable,
    /// The payment did not go through.
    PaymentFailed,
    /// The order was fulfilled.
    Completed,
}

impl Notice {
    /// Message text stored by the notification service.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::SlotUnavailable => "Failed to occupy slot, canceling order",
            Self::PaymentFailed => "Failed to pay for order, canceling order and slot",
            Self::Completed => "Order was successfully completed",
        }
    }

    /// Short stable name, used in logs and idempotency keys.
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::SlotUnavailable => "notify_slot_unavailable",
            Self::PaymentFailed => "notify_payment_failed",
            Self::Completed => "notify_completed",
        }
    }
}

/// Side effect requested by a [`Step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaAction {
    /// Ask the reservation service to occupy a slot; its answer arrives as
    /// a callback.
    OccupySlot,
    /// Reserve a ledger token and request the debit; the settlement arrives
    /// as a callback.
    RequestPayment,
    /// Tell the user something.
    Notify(Notice),
    /// Compensation: release the slot held for this order.
    CancelSlot,
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    /// Status to swap in, if the order moves.
    pub next: Option<OrderStatus>,
    /// Price to persist together with `next`.
    pub price: Option<i64>,
    /// Side effects to run after the swap succeeded.
    pub actions: Vec<SagaAction>,
    /// Re-run [`decide`] with [`SagaEvent::Advance`] afterwards.
    pub follow_up: bool,
}

impl Step {
    fn stale() -> Self {
        Self::default()
    }

    fn to(next: OrderStatus) -> Self {
        Self {
            next: Some(next),
            ..Self::default()
        }
    }

    fn then_advance(mut self) -> Self {
        self.follow_up = true;
        self
    }

    fn with(mut self, action: SagaAction) -> Self {
        self.actions.push(action);
        self
    }

    /// `true` if the step neither moves the order nor does anything.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.next.is_none() && self.actions.is_empty()
    }
}

/// The saga transition function.
#[must_use]
pub fn decide(status: OrderStatus, event: SagaEvent) -> Step {
    use OrderStatus as S;
    use SagaEvent as E;

    match (status, event) {
        (S::Created, E::Advance) => Step::to(S::NeedsSlot).then_advance(),

        (S::NeedsSlot, E::Advance) => Step::stale().with(SagaAction::OccupySlot),
        (S::NeedsSlot, E::SlotReserved { price }) => Step {
            price: Some(price),
            ..Step::to(S::SlotHeld)
        }
        .then_advance(),
        (S::NeedsSlot, E::SlotRejected | E::SlotCallFailed) => {
            Step::to(S::Cancelled).with(SagaAction::Notify(Notice::SlotUnavailable))
        }

        (S::SlotHeld, E::Advance) => Step::to(S::NeedsPayment).then_advance(),

        (S::NeedsPayment, E::Advance) => Step::stale().with(SagaAction::RequestPayment),
        (S::NeedsPayment, E::PaymentSettled) => Step::to(S::Paid).then_advance(),
        (S::NeedsPayment, E::PaymentRejected | E::PaymentCallFailed) => Step::to(S::Cancelled)
            .with(SagaAction::Notify(Notice::PaymentFailed))
            .with(SagaAction::CancelSlot),

        (S::Paid, E::Advance) => Step::to(S::Completed).with(SagaAction::Notify(Notice::Completed)),

        _ => Step::stale(),
    }
}
