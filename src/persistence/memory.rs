//! In-memory stores with the same conditional-update semantics as the
//! PostgreSQL ones.
//!
//! Each store keeps its rows behind a single [`tokio::sync::RwLock`]; every
//! conditional update checks and writes under one write guard, which gives
//! the same compare-and-swap behavior the SQL `WHERE` clauses provide.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{LedgerStore, OrderStore, check_transition};
use crate::domain::{
    EntryState, EventId, LedgerEntry, Order, OrderId, OrderStatus, RequestToken, SettleOutcome,
    UserId,
};
use crate::error::BookingError;

#[derive(Debug, Default)]
struct OrderTable {
    last_id: i64,
    rows: BTreeMap<OrderId, Order>,
}

/// Order store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    table: RwLock<OrderTable>,
}

impl MemoryOrderStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create(&self, user_id: UserId, event_id: EventId) -> Result<Order, BookingError> {
        let mut table = self.table.write().await;
        table.last_id = table.last_id.saturating_add(1);
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(table.last_id),
            user_id,
            event_id,
            price: 0,
            status: OrderStatus::Created,
            ledger_token: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, BookingError> {
        Ok(self.table.read().await.rows.get(&order_id).cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, BookingError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn transition(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        price: Option<i64>,
    ) -> Result<bool, BookingError> {
        check_transition(from, to)?;
        let mut table = self.table.write().await;
        let Some(order) = table.rows.get_mut(&order_id) else {
            return Ok(false);
        };
        if order.status != from {
            return Ok(false);
        }
        order.status = to;
        if let Some(price) = price {
            order.price = price;
        }
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn attach_ledger_token(
        &self,
        order_id: OrderId,
        token: &RequestToken,
    ) -> Result<bool, BookingError> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&order_id) {
            Some(order)
                if order.status == OrderStatus::NeedsPayment && order.ledger_token.is_none() =>
            {
                order.ledger_token = Some(token.clone());
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Ledger store backed by a map keyed by `(user_id, token)`.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    entries: RwLock<HashMap<(UserId, RequestToken), LedgerEntry>>,
}

impl MemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn settled_sum<'a>(entries: impl Iterator<Item = &'a LedgerEntry>, user_id: UserId) -> i64 {
    entries
        .filter(|e| e.user_id == user_id && e.state == EntryState::Settled)
        .fold(0_i64, |acc, e| acc.saturating_add(e.delta))
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn reserve(&self, user_id: UserId, token: &RequestToken) -> Result<(), BookingError> {
        let mut entries = self.entries.write().await;
        let key = (user_id, token.clone());
        if entries.contains_key(&key) {
            return Err(BookingError::TokenConflict(token.to_string()));
        }
        entries.insert(key, LedgerEntry::pending(user_id, token.clone()));
        Ok(())
    }

    async fn settle(
        &self,
        user_id: UserId,
        token: &RequestToken,
        delta: i64,
    ) -> Result<SettleOutcome, BookingError> {
        let mut entries = self.entries.write().await;
        let balance = settled_sum(entries.values(), user_id);
        match entries.get_mut(&(user_id, token.clone())) {
            Some(entry) if entry.state == EntryState::Pending => {
                if balance.checked_add(delta).is_none() {
                    return Ok(SettleOutcome::Overflow);
                }
                entry.delta = delta;
                entry.state = EntryState::Settled;
                Ok(SettleOutcome::Applied)
            }
            _ => Ok(SettleOutcome::NotPending),
        }
    }

    async fn settle_debit(
        &self,
        user_id: UserId,
        token: &RequestToken,
        amount: i64,
    ) -> Result<SettleOutcome, BookingError> {
        let mut entries = self.entries.write().await;
        let balance = settled_sum(entries.values(), user_id);
        match entries.get_mut(&(user_id, token.clone())) {
            Some(entry) if entry.state == EntryState::Pending => {
                if balance.saturating_sub(amount) < 0 {
                    return Ok(SettleOutcome::InsufficientFunds);
                }
                entry.delta = -amount;
                entry.state = EntryState::Settled;
                Ok(SettleOutcome::Applied)
            }
            _ => Ok(SettleOutcome::NotPending),
        }
    }

    async fn entry(
        &self,
        user_id: UserId,
        token: &RequestToken,
    ) -> Result<Option<LedgerEntry>, BookingError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(user_id, token.clone())).cloned())
    }

    async fn balance(&self, user_id: UserId) -> Result<i64, BookingError> {
        let entries = self.entries.read().await;
        Ok(settled_sum(entries.values(), user_id))
    }
}
