//! In-process collaborators for the integration tests.
//!
//! Callbacks that the real services would POST back are queued instead;
//! [`Harness::deliver_callbacks`] feeds them to the orchestrator until the
//! system is quiet.

#![allow(clippy::panic, dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use booking_saga::clients::{
    ClientError, Notifier, PaymentCallbackSink, PaymentGateway, SlotReservation,
};
use booking_saga::domain::{
    EventId, Order, OrderId, OrderStatus, PaymentCallback, RequestToken, SlotCallback, UserId,
};
use booking_saga::error::BookingError;
use booking_saga::persistence::{MemoryLedgerStore, MemoryOrderStore, OrderStore};
use booking_saga::service::{Collaborators, LedgerService, OrderOrchestrator, RetryPolicy};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Default)]
struct EventSlots {
    capacity: i64,
    occupied: i64,
    price: i64,
}

#[derive(Debug, Default)]
struct EventsState {
    events: HashMap<EventId, EventSlots>,
    holders: HashMap<OrderId, EventId>,
    callbacks: VecDeque<SlotCallback>,
    cancelled: Vec<(OrderId, String)>,
}

/// Reservation service with per-event capacity. Answers occupy requests
/// through queued callbacks.
#[derive(Debug, Default)]
pub struct FakeEvents {
    state: Mutex<EventsState>,
}

impl FakeEvents {
    /// Registers an event.
    pub fn add_event(&self, event_id: EventId, capacity: i64, price: i64) {
        lock(&self.state).events.insert(
            event_id,
            EventSlots {
                capacity,
                occupied: 0,
                price,
            },
        );
    }

    /// Slots currently taken for `event_id`.
    pub fn occupied(&self, event_id: EventId) -> i64 {
        lock(&self.state)
            .events
            .get(&event_id)
            .map_or(0, |e| e.occupied)
    }

    /// Orders whose slot was released, with the idempotency key used.
    pub fn cancelled(&self) -> Vec<(OrderId, String)> {
        lock(&self.state).cancelled.clone()
    }

    /// Next queued callback.
    pub fn take_callback(&self) -> Option<SlotCallback> {
        lock(&self.state).callbacks.pop_front()
    }
}

#[async_trait]
impl SlotReservation for FakeEvents {
    async fn occupy(&self, order: &Order) -> Result<(), ClientError> {
        let mut state = lock(&self.state);
        let (status, price) = match state.events.get_mut(&order.event_id) {
            Some(event) if event.occupied < event.capacity => {
                event.occupied += 1;
                (true, event.price)
            }
            _ => (false, 0),
        };
        if status {
            state.holders.insert(order.id, order.event_id);
        }
        state.callbacks.push_back(SlotCallback {
            order_id: order.id,
            user_id: order.user_id,
            price,
            status,
        });
        Ok(())
    }

    async fn cancel(&self, order: &Order, idempotency_key: &str) -> Result<(), ClientError> {
        let mut state = lock(&self.state);
        state.cancelled.push((order.id, idempotency_key.to_string()));
        if let Some(event_id) = state.holders.remove(&order.id) {
            if let Some(event) = state.events.get_mut(&event_id) {
                event.occupied -= 1;
            }
        }
        Ok(())
    }
}

/// Notification service that remembers every message.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(OrderId, String)>>,
}

impl RecordingNotifier {
    /// Messages sent about `order_id`.
    pub fn messages_for(&self, order_id: OrderId) -> Vec<String> {
        lock(&self.messages)
            .iter()
            .filter(|(id, _)| *id == order_id)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        _user_id: UserId,
        order_id: OrderId,
        message: &str,
        _idempotency_key: &str,
    ) -> Result<(), ClientError> {
        lock(&self.messages).push((order_id, message.to_string()));
        Ok(())
    }
}

/// Queues payment callbacks produced by the ledger.
#[derive(Debug)]
pub struct QueueSink(pub mpsc::UnboundedSender<PaymentCallback>);

#[async_trait]
impl PaymentCallbackSink for QueueSink {
    async fn deliver(&self, callback: &PaymentCallback) -> Result<(), ClientError> {
        self.0
            .send(callback.clone())
            .map_err(|e| ClientError::Transport {
                endpoint: "queue".to_string(),
                message: e.to_string(),
            })
    }
}

/// Calls the ledger service in-process, mapping its errors to the status
/// codes the HTTP endpoint would answer with.
#[derive(Debug)]
pub struct InProcessLedger(pub Arc<LedgerService>);

fn as_client_error(endpoint: &str, err: &BookingError) -> ClientError {
    ClientError::Status {
        endpoint: endpoint.to_string(),
        status: err.status_code().as_u16(),
    }
}

#[async_trait]
impl PaymentGateway for InProcessLedger {
    async fn begin_operation(&self, user_id: UserId) -> Result<RequestToken, ClientError> {
        self.0
            .begin_operation(user_id, None)
            .await
            .map_err(|e| as_client_error("genreq", &e))
    }

    async fn withdraw(
        &self,
        user_id: UserId,
        token: &RequestToken,
        order_id: OrderId,
        amount: i64,
    ) -> Result<(), ClientError> {
        self.0
            .withdraw(user_id, token, order_id, amount)
            .await
            .map_err(|e| as_client_error("withdrawal", &e))
    }
}

/// Order store that records every transition it applied.
#[derive(Debug, Default)]
pub struct RecordingOrderStore {
    inner: MemoryOrderStore,
    applied: Mutex<Vec<(OrderId, OrderStatus, OrderStatus)>>,
}

impl RecordingOrderStore {
    /// Applied transitions for `order_id`, in order.
    pub fn history(&self, order_id: OrderId) -> Vec<(OrderStatus, OrderStatus)> {
        lock(&self.applied)
            .iter()
            .filter(|(id, _, _)| *id == order_id)
            .map(|(_, from, to)| (*from, *to))
            .collect()
    }
}

#[async_trait]
impl OrderStore for RecordingOrderStore {
    async fn create(&self, user_id: UserId, event_id: EventId) -> Result<Order, BookingError> {
        self.inner.create(user_id, event_id).await
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, BookingError> {
        self.inner.get(order_id).await
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, BookingError> {
        self.inner.list_for_user(user_id).await
    }

    async fn transition(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        price: Option<i64>,
    ) -> Result<bool, BookingError> {
        let applied = self.inner.transition(order_id, from, to, price).await?;
        if applied {
            lock(&self.applied).push((order_id, from, to));
        }
        Ok(applied)
    }

    async fn attach_ledger_token(
        &self,
        order_id: OrderId,
        token: &RequestToken,
    ) -> Result<bool, BookingError> {
        self.inner.attach_ledger_token(order_id, token).await
    }
}

/// Orchestrator and ledger wired to in-process fakes.
#[derive(Debug)]
pub struct Harness {
    /// Saga driver under test.
    pub orchestrator: OrderOrchestrator,
    /// Ledger, also reachable through the orchestrator's payment port.
    pub ledger: Arc<LedgerService>,
    /// Order rows plus the transitions applied to them.
    pub orders: Arc<RecordingOrderStore>,
    /// Reservation service.
    pub events: Arc<FakeEvents>,
    /// Notification service.
    pub notifier: Arc<RecordingNotifier>,
    payments: mpsc::UnboundedReceiver<PaymentCallback>,
}

impl Harness {
    /// Fresh system with no events and empty balances.
    pub fn new() -> Self {
        let (tx, payments) = mpsc::unbounded_channel();
        let ledger = Arc::new(LedgerService::new(
            Arc::new(MemoryLedgerStore::new()),
            Arc::new(QueueSink(tx)),
        ));
        let orders = Arc::new(RecordingOrderStore::default());
        let events = Arc::new(FakeEvents::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let collaborators = Collaborators {
            slots: Arc::clone(&events) as Arc<dyn SlotReservation>,
            payments: Arc::new(InProcessLedger(Arc::clone(&ledger))),
            notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
        };
        let orchestrator = OrderOrchestrator::new(
            Arc::clone(&orders) as Arc<dyn OrderStore>,
            collaborators,
            RetryPolicy::new(3, Duration::ZERO, Duration::ZERO),
        );

        Self {
            orchestrator,
            ledger,
            orders,
            events,
            notifier,
            payments,
        }
    }

    /// Credits `amount` to `user_id` through the two-phase protocol.
    pub async fn fund(&self, user_id: UserId, amount: i64) {
        let Ok(token) = self.ledger.begin_operation(user_id, None).await else {
            panic!("reserve failed");
        };
        let Ok(()) = self.ledger.deposit(user_id, &token, amount).await else {
            panic!("deposit failed");
        };
    }

    /// Balance of `user_id`.
    pub async fn balance(&self, user_id: UserId) -> i64 {
        let Ok(balance) = self.ledger.balance(user_id).await else {
            panic!("balance failed");
        };
        balance
    }

    /// Creates an order and runs the saga until no callback is pending.
    pub async fn book(&mut self, user_id: UserId, event_id: EventId) -> Order {
        let Ok(order) = self.orchestrator.create_order(user_id, event_id).await else {
            panic!("create failed");
        };
        self.deliver_callbacks().await;
        self.order(order.id).await
    }

    /// Current state of `order_id`.
    pub async fn order(&self, order_id: OrderId) -> Order {
        let Ok(order) = self.orchestrator.order(order_id).await else {
            panic!("order {order_id} missing");
        };
        order
    }

    /// Feeds queued callbacks to the orchestrator until none arrive.
    pub async fn deliver_callbacks(&mut self) {
        loop {
            if let Some(callback) = self.events.take_callback() {
                let _ = self.orchestrator.on_slot_callback(&callback).await;
                continue;
            }
            match tokio::time::timeout(Duration::from_millis(200), self.payments.recv()).await {
                Ok(Some(callback)) => {
                    let _ = self.orchestrator.on_payment_callback(&callback).await;
                }
                _ => break,
            }
        }
    }

    /// Next payment callback, without delivering it.
    pub async fn next_payment_callback(&mut self) -> Option<PaymentCallback> {
        tokio::time::timeout(Duration::from_millis(200), self.payments.recv())
            .await
            .ok()
            .flatten()
    }
}
