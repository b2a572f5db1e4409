//! Database row shapes for orders and ledger entries.

use chrono::{DateTime, Utc};

use crate::domain::{EntryState, LedgerEntry, Order, OrderStatus, RequestToken, UserId};
use crate::error::BookingError;

/// Column list shared by every order query, matching [`OrderRow`].
pub const ORDER_COLUMNS: &str =
    "id, user_id, event_id, price, status, ledger_token, created_at, updated_at";

/// A row from the `orders` table, in [`ORDER_COLUMNS`] order.
pub type OrderRow = (
    i64,
    i64,
    i64,
    i64,
    i16,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

/// Decodes an [`OrderRow`] into the domain [`Order`].
///
/// # Errors
///
/// Returns [`BookingError::PersistenceError`] for an unknown status code.
pub fn order_from_row(row: OrderRow) -> Result<Order, BookingError> {
    let (id, user_id, event_id, price, status, ledger_token, created_at, updated_at) = row;
    let status = OrderStatus::from_code(status).ok_or_else(|| {
        BookingError::PersistenceError(format!("order {id} has unknown status code {status}"))
    })?;
    Ok(Order {
        id: id.into(),
        user_id: user_id.into(),
        event_id: event_id.into(),
        price,
        status,
        ledger_token: ledger_token.as_deref().and_then(RequestToken::parse),
        created_at,
        updated_at,
    })
}

/// `(delta, state)` of one `ledger_entries` row.
pub type LedgerRow = (i64, i16);

/// Decodes a [`LedgerRow`] for the entry keyed by `(user_id, token)`.
///
/// # Errors
///
/// Returns [`BookingError::PersistenceError`] for an unknown state code.
pub fn entry_from_row(
    user_id: UserId,
    token: &RequestToken,
    (delta, state): LedgerRow,
) -> Result<LedgerEntry, BookingError> {
    let state = EntryState::from_code(state).ok_or_else(|| {
        BookingError::PersistenceError(format!("ledger entry {token} has unknown state {state}"))
    })?;
    Ok(LedgerEntry {
        user_id,
        token: token.clone(),
        delta,
        state,
    })
}
