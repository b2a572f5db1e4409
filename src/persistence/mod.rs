//! Persistence layer: order rows and ledger entries.
//!
//! Two store traits define the only ways state may change:
//!
//! - [`OrderStore`] moves orders by true compare-and-swap on the status
//!   column, so a stale or duplicated transition affects zero rows.
//! - [`LedgerStore`] implements the two-phase reserve/settle protocol where
//!   settlement is a conditional update on a pending entry.
//!
//! [`postgres`] backs both with `sqlx::PgPool`; [`memory`] provides
//! lock-protected maps with the same semantics for tests and local runs.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;

use crate::domain::{
    EventId, LedgerEntry, Order, OrderId, OrderStatus, RequestToken, SettleOutcome, UserId,
};
use crate::error::BookingError;

pub use memory::{MemoryLedgerStore, MemoryOrderStore};
pub use postgres::{PostgresLedgerStore, PostgresOrderStore};

/// Durable storage for orders.
#[async_trait]
pub trait OrderStore: Send + Sync + std::fmt::Debug {
    /// Inserts a new order in `created` status with price 0.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::PersistenceError`] on storage failure.
    async fn create(&self, user_id: UserId, event_id: EventId) -> Result<Order, BookingError>;

    /// Loads one order.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::PersistenceError`] on storage failure.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, BookingError>;

    /// Lists all orders owned by `user_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::PersistenceError`] on storage failure.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, BookingError>;

    /// Moves the order from `from` to `to` only if it is still in `from`.
    /// When `price` is given it is written in the same update.
    ///
    /// Returns `false` when the swap lost (the order moved on or does not
    /// exist).
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidRequest`] for an illegal transition and
    /// [`BookingError::PersistenceError`] on storage failure.
    async fn transition(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        price: Option<i64>,
    ) -> Result<bool, BookingError>;

    /// Records the ledger token of the payment requested for this order.
    /// Succeeds only while the order is `needs_payment` and has no token.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::PersistenceError`] on storage failure.
    async fn attach_ledger_token(
        &self,
        order_id: OrderId,
        token: &RequestToken,
    ) -> Result<bool, BookingError>;
}

/// Durable storage for ledger entries.
#[async_trait]
pub trait LedgerStore: Send + Sync + std::fmt::Debug {
    /// Inserts a pending entry (delta 0) for `(user_id, token)`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::TokenConflict`] if the pair already exists and
    /// [`BookingError::PersistenceError`] on storage failure.
    async fn reserve(&self, user_id: UserId, token: &RequestToken) -> Result<(), BookingError>;

    /// Applies `delta` and flips the entry to settled, only if a pending entry
    /// for `(user_id, token)` exists and the resulting balance still fits in
    /// an `i64` (otherwise [`SettleOutcome::Overflow`], entry left pending).
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::PersistenceError`] on storage failure.
    async fn settle(
        &self,
        user_id: UserId,
        token: &RequestToken,
        delta: i64,
    ) -> Result<SettleOutcome, BookingError>;

    /// Settles a debit of `amount` with the non-negative balance check folded
    /// into the same conditional update.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::PersistenceError`] on storage failure.
    async fn settle_debit(
        &self,
        user_id: UserId,
        token: &RequestToken,
        amount: i64,
    ) -> Result<SettleOutcome, BookingError>;

    /// Loads the entry for `(user_id, token)`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::PersistenceError`] on storage failure.
    async fn entry(
        &self,
        user_id: UserId,
        token: &RequestToken,
    ) -> Result<Option<LedgerEntry>, BookingError>;

    /// Sum of settled deltas for `user_id`; pending entries never count.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::PersistenceError`] on storage failure.
    async fn balance(&self, user_id: UserId) -> Result<i64, BookingError>;
}

/// Rejects transitions the order lifecycle does not allow.
pub(crate) fn check_transition(from: OrderStatus, to: OrderStatus) -> Result<(), BookingError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(BookingError::InvalidRequest(format!(
            "illegal order transition {from} -> {to}"
        )))
    }
}
