//! Order orchestrator: drives orders through the fulfillment saga.
//!
//! Every entry point (order creation, the reservation callback, the payment
//! callback) funnels into [`OrderOrchestrator::drive`], which loops:
//!
//! 1. reload the order and feed its persisted status plus the current event
//!    to [`decide`];
//! 2. compare-and-swap the status the step asks for; a lost swap means
//!    another invocation already handled this order, so the loop stops;
//! 3. run the step's side effects; a failed outbound request becomes the
//!    matching failure event and goes round the loop again;
//! 4. continue with [`SagaEvent::Advance`] while the step asks for a
//!    follow-up.
//!
//! No state is kept between invocations. Duplicate callbacks and concurrent
//! drivers are harmless because every status change is conditional on the
//! status it was decided from.

use std::sync::Arc;

use crate::clients::{Notifier, PaymentGateway, SlotReservation};
use crate::domain::{
    EventId, Notice, Order, OrderId, OrderStatus, PaymentCallback, SagaAction, SagaEvent,
    SlotCallback, UserId, decide,
};
use crate::error::BookingError;
use crate::persistence::OrderStore;
use crate::service::compensation::{CompensationAction, RetryPolicy, run_compensation};

/// The three services the orchestrator calls out to.
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// Slot-reservation service.
    pub slots: Arc<dyn SlotReservation>,
    /// Ledger.
    pub payments: Arc<dyn PaymentGateway>,
    /// Notification service.
    pub notifier: Arc<dyn Notifier>,
}

/// Owns the order lifecycle.
#[derive(Debug, Clone)]
pub struct OrderOrchestrator {
    orders: Arc<dyn OrderStore>,
    collaborators: Collaborators,
    compensation: RetryPolicy,
}

impl OrderOrchestrator {
    /// Creates an orchestrator over `orders` calling `collaborators`, with
    /// compensations retried under `compensation`.
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderStore>,
        collaborators: Collaborators,
        compensation: RetryPolicy,
    ) -> Self {
        Self {
            orders,
            collaborators,
            compensation,
        }
    }

    /// Persists a new order and drives it as far as it can go synchronously.
    ///
    /// The order is returned as persisted at creation; a failure while
    /// driving it is logged and reflected in its status, not returned.
    ///
    /// # Errors
    ///
    /// Returns a [`BookingError`] if the order could not be persisted.
    pub async fn create_order(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<Order, BookingError> {
        let order = self.orders.create(user_id, event_id).await?;
        tracing::info!(order_id = %order.id, %user_id, %event_id, "order created");

        if let Err(err) = self.advance(order.id).await {
            tracing::error!(order_id = %order.id, error = %err, "failed to advance new order");
        }
        Ok(order)
    }

    /// Returns the orders owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`BookingError`] on storage failure.
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, BookingError> {
        self.orders.list_for_user(user_id).await
    }

    /// Loads one order.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::OrderNotFound`] if it does not exist.
    pub async fn order(&self, order_id: OrderId) -> Result<Order, BookingError> {
        self.orders
            .get(order_id)
            .await?
            .ok_or(BookingError::OrderNotFound(order_id))
    }

    /// Re-derives the next action from the persisted status and runs it.
    /// Returns the status the order was left in.
    ///
    /// # Errors
    ///
    /// Returns a [`BookingError`] if the order is unknown or storage fails.
    pub async fn advance(&self, order_id: OrderId) -> Result<OrderStatus, BookingError> {
        self.drive(order_id, SagaEvent::Advance).await
    }

    /// Handles the reservation service's answer to an occupy request.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidRequest`] for a payload that does not
    /// match the order, or a storage error.
    pub async fn on_slot_callback(
        &self,
        callback: &SlotCallback,
    ) -> Result<OrderStatus, BookingError> {
        let event = if callback.status {
            if callback.price < 0 {
                return Err(BookingError::NegativeAmount(callback.price));
            }
            SagaEvent::SlotReserved {
                price: callback.price,
            }
        } else {
            SagaEvent::SlotRejected
        };
        self.check_owner(callback.order_id, callback.user_id).await?;
        tracing::info!(
            order_id = %callback.order_id,
            status = callback.status,
            price = callback.price,
            "slot callback received"
        );
        self.drive(callback.order_id, event).await
    }

    /// Handles the ledger's answer to a withdrawal request.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidRequest`] for a payload that does not
    /// match the order, or a storage error.
    pub async fn on_payment_callback(
        &self,
        callback: &PaymentCallback,
    ) -> Result<OrderStatus, BookingError> {
        let event = if callback.status {
            SagaEvent::PaymentSettled
        } else {
            SagaEvent::PaymentRejected
        };
        self.check_owner(callback.order_id, callback.user_id).await?;
        tracing::info!(
            order_id = %callback.order_id,
            status = callback.status,
            "payment callback received"
        );
        self.drive(callback.order_id, event).await
    }

    async fn check_owner(&self, order_id: OrderId, user_id: UserId) -> Result<(), BookingError> {
        let order = self.order(order_id).await?;
        if order.user_id != user_id {
            tracing::warn!(%order_id, owner = %order.user_id, claimed = %user_id, "callback for foreign order");
            return Err(BookingError::InvalidRequest(format!(
                "order {order_id} does not belong to user {user_id}"
            )));
        }
        Ok(())
    }

    /// The single driver behind every entry point.
    async fn drive(
        &self,
        order_id: OrderId,
        mut event: SagaEvent,
    ) -> Result<OrderStatus, BookingError> {
        loop {
            let mut order = self.order(order_id).await?;
            let step = decide(order.status, event);

            if step.is_noop() {
                if event != SagaEvent::Advance {
                    tracing::info!(%order_id, status = %order.status, ?event, "stale event ignored");
                }
                return Ok(order.status);
            }

            if let Some(next) = step.next {
                match self
                    .orders
                    .transition(order_id, order.status, next, step.price)
                    .await
                {
                    Ok(true) => {
                        tracing::info!(%order_id, from = %order.status, to = %next, "order transitioned");
                        order.status = next;
                        if let Some(price) = step.price {
                            order.price = price;
                        }
                    }
                    Ok(false) => {
                        tracing::info!(
                            %order_id,
                            expected = %order.status,
                            "transition lost to a concurrent update"
                        );
                        return Ok(self.order(order_id).await?.status);
                    }
                    Err(err) => {
                        tracing::error!(%order_id, status = %order.status, error = %err, "failed to persist transition");
                        self.abort(&order, event).await;
                        return Err(err);
                    }
                }
            }

            let mut failure = None;
            for action in &step.actions {
                if let Some(failed) = self.perform(&order, *action).await {
                    failure = Some(failed);
                    break;
                }
            }

            match failure {
                Some(failed) => event = failed,
                None if step.follow_up => event = SagaEvent::Advance,
                None => return Ok(order.status),
            }
        }
    }

    /// Runs one side effect. Returns the failure event to feed back into the
    /// saga when a forward request could not be made.
    async fn perform(&self, order: &Order, action: SagaAction) -> Option<SagaEvent> {
        match action {
            SagaAction::OccupySlot => {
                match self.collaborators.slots.occupy(order).await {
                    Ok(()) => {
                        tracing::info!(order_id = %order.id, event_id = %order.event_id, "slot requested");
                        None
                    }
                    Err(err) => {
                        tracing::warn!(order_id = %order.id, event_id = %order.event_id, error = %err, "failed to request slot");
                        Some(SagaEvent::SlotCallFailed)
                    }
                }
            }
            SagaAction::RequestPayment => match self.request_payment(order).await {
                Ok(()) => None,
                Err(err) => {
                    tracing::warn!(order_id = %order.id, error = %err, "failed to request payment");
                    Some(SagaEvent::PaymentCallFailed)
                }
            },
            SagaAction::Notify(notice) => {
                self.send_notice(order, notice).await;
                None
            }
            SagaAction::CancelSlot => {
                self.release_slot(order).await;
                None
            }
        }
    }

    /// Reserves (or resumes) the ledger token for `order` and requests the
    /// debit. The outcome arrives through [`Self::on_payment_callback`].
    async fn request_payment(&self, order: &Order) -> Result<(), BookingError> {
        let payments = &self.collaborators.payments;

        let token = match &order.ledger_token {
            Some(token) => {
                tracing::info!(order_id = %order.id, "resuming payment with persisted token");
                token.clone()
            }
            None => {
                let token = payments.begin_operation(order.user_id).await?;
                if !self.orders.attach_ledger_token(order.id, &token).await? {
                    tracing::info!(order_id = %order.id, "payment already requested by another invocation");
                    return Ok(());
                }
                token
            }
        };

        payments
            .withdraw(order.user_id, &token, order.id, order.price)
            .await?;
        tracing::info!(order_id = %order.id, amount = order.price, "payment requested");
        Ok(())
    }

    async fn send_notice(&self, order: &Order, notice: Notice) {
        let action = CompensationAction::new(notice.kind(), order.id);
        let notifier = &self.collaborators.notifier;
        run_compensation(&self.compensation, &action, || {
            notifier.notify(
                order.user_id,
                order.id,
                notice.message(),
                &action.idempotency_key,
            )
        })
        .await;
    }

    async fn release_slot(&self, order: &Order) {
        let action = CompensationAction::new("cancel_slot", order.id);
        let slots = &self.collaborators.slots;
        if run_compensation(&self.compensation, &action, || {
            slots.cancel(order, &action.idempotency_key)
        })
        .await
        {
            tracing::info!(order_id = %order.id, "slot released");
        }
    }

    /// Best-effort cancellation after a persistence error left the order
    /// mid-step. Releases the slot too if one is known to be held.
    async fn abort(&self, order: &Order, event: SagaEvent) {
        if !order.status.is_cancellable() {
            return;
        }
        match self
            .orders
            .transition(order.id, order.status, OrderStatus::Cancelled, None)
            .await
        {
            Ok(true) => {
                tracing::warn!(order_id = %order.id, from = %order.status, "order cancelled after persistence error");
                let slot_held = matches!(
                    order.status,
                    OrderStatus::SlotHeld | OrderStatus::NeedsPayment
                ) || matches!(event, SagaEvent::SlotReserved { .. });
                if slot_held {
                    self.release_slot(order).await;
                }
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!(order_id = %order.id, error = %err, "failed to cancel order");
            }
        }
    }
}
