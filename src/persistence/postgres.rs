//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::{LedgerRow, ORDER_COLUMNS, OrderRow, entry_from_row, order_from_row};
use super::{LedgerStore, OrderStore, check_transition};
use crate::config::BookingConfig;
use crate::domain::{
    EntryState, EventId, LedgerEntry, Order, OrderId, OrderStatus, RequestToken, SettleOutcome,
    UserId,
};
use crate::error::BookingError;

/// Opens the connection pool described by `config`.
///
/// # Errors
///
/// Returns a [`BookingError::PersistenceError`] if the database cannot be
/// reached within the configured timeout.
pub async fn connect(config: &BookingConfig) -> Result<PgPool, BookingError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

/// Applies the bundled schema migrations.
///
/// # Errors
///
/// Returns a [`BookingError::PersistenceError`] if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), BookingError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| BookingError::PersistenceError(e.to_string()))
}

/// PostgreSQL-backed order store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new order store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn create(&self, user_id: UserId, event_id: EventId) -> Result<Order, BookingError> {
        let sql = format!(
            "INSERT INTO orders (user_id, event_id, price, status) VALUES ($1, $2, 0, $3) \
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id.get())
            .bind(event_id.get())
            .bind(OrderStatus::Created.code())
            .fetch_one(&self.pool)
            .await?;
        order_from_row(row)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, BookingError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.map(order_from_row).transpose()
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, BookingError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY id ASC");
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id.get())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(order_from_row).collect()
    }

    async fn transition(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        price: Option<i64>,
    ) -> Result<bool, BookingError> {
        check_transition(from, to)?;
        let result = sqlx::query(
            "UPDATE orders SET status = $3, price = COALESCE($4, price), updated_at = now() \
             WHERE id = $1 AND status = $2",
        )
        .bind(order_id.get())
        .bind(from.code())
        .bind(to.code())
        .bind(price)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn attach_ledger_token(
        &self,
        order_id: OrderId,
        token: &RequestToken,
    ) -> Result<bool, BookingError> {
        let result = sqlx::query(
            "UPDATE orders SET ledger_token = $2, updated_at = now() \
             WHERE id = $1 AND status = $3 AND ledger_token IS NULL",
        )
        .bind(order_id.get())
        .bind(token.as_str())
        .bind(OrderStatus::NeedsPayment.code())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// PostgreSQL-backed ledger store using `sqlx::PgPool`.
///
/// Entries are keyed by `(user_id, request_id)`. Settlements serialize per
/// user through `pg_advisory_xact_lock`, so the balance bounds checked
/// inside the settling `UPDATE` cannot be invalidated by a concurrent
/// settlement.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Creates a new ledger store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Settles `delta` only if the resulting balance stays within
    /// `[floor, i64::MAX]`. A pending entry that fails the bound is left
    /// pending and reported as `refused`.
    async fn settle_within(
        &self,
        user_id: UserId,
        token: &RequestToken,
        delta: i64,
        floor: i64,
        refused: SettleOutcome,
    ) -> Result<SettleOutcome, BookingError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(user_id.get())
            .execute(&mut *tx)
            .await?;

        // SUM over BIGINT yields NUMERIC, so the bound check itself cannot
        // overflow.
        let result = sqlx::query(
            "UPDATE ledger_entries SET delta = $3, state = $4, settled_at = now() \
             WHERE user_id = $1 AND request_id = $2 AND state = $5 \
             AND (SELECT COALESCE(SUM(delta), 0) FROM ledger_entries \
                  WHERE user_id = $1 AND state = $4) + $3 BETWEEN $6 AND $7",
        )
        .bind(user_id.get())
        .bind(token.as_str())
        .bind(delta)
        .bind(EntryState::Settled.code())
        .bind(EntryState::Pending.code())
        .bind(floor)
        .bind(i64::MAX)
        .execute(&mut *tx)
        .await?;

        let outcome = if result.rows_affected() == 1 {
            SettleOutcome::Applied
        } else {
            let pending = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM ledger_entries \
                 WHERE user_id = $1 AND request_id = $2 AND state = $3)",
            )
            .bind(user_id.get())
            .bind(token.as_str())
            .bind(EntryState::Pending.code())
            .fetch_one(&mut *tx)
            .await?;
            if pending { refused } else { SettleOutcome::NotPending }
        };

        tx.commit().await?;
        Ok(outcome)
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn reserve(&self, user_id: UserId, token: &RequestToken) -> Result<(), BookingError> {
        let result = sqlx::query(
            "INSERT INTO ledger_entries (user_id, request_id, delta, state) VALUES ($1, $2, 0, $3) \
             ON CONFLICT (user_id, request_id) DO NOTHING",
        )
        .bind(user_id.get())
        .bind(token.as_str())
        .bind(EntryState::Pending.code())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BookingError::TokenConflict(token.to_string()));
        }
        Ok(())
    }

    async fn settle(
        &self,
        user_id: UserId,
        token: &RequestToken,
        delta: i64,
    ) -> Result<SettleOutcome, BookingError> {
        self.settle_within(user_id, token, delta, i64::MIN, SettleOutcome::Overflow)
            .await
    }

    async fn settle_debit(
        &self,
        user_id: UserId,
        token: &RequestToken,
        amount: i64,
    ) -> Result<SettleOutcome, BookingError> {
        let delta = amount.checked_neg().ok_or(BookingError::NegativeAmount(amount))?;
        self.settle_within(user_id, token, delta, 0, SettleOutcome::InsufficientFunds)
            .await
    }

    async fn entry(
        &self,
        user_id: UserId,
        token: &RequestToken,
    ) -> Result<Option<LedgerEntry>, BookingError> {
        let row = sqlx::query_as::<_, LedgerRow>(
            "SELECT delta, state FROM ledger_entries WHERE user_id = $1 AND request_id = $2",
        )
        .bind(user_id.get())
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| entry_from_row(user_id, token, row)).transpose()
    }

    async fn balance(&self, user_id: UserId) -> Result<i64, BookingError> {
        let balance = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(delta), 0)::BIGINT FROM ledger_entries \
             WHERE user_id = $1 AND state = $2",
        )
        .bind(user_id.get())
        .bind(EntryState::Settled.code())
        .fetch_one(&self.pool)
        .await?;
        Ok(balance)
    }
}
