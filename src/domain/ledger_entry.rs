//! Ledger entries and the idempotency token that keys them.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::UserId;

/// Opaque idempotency token correlating one reservation with at most one
/// settlement. Travels as the `X-Request-Id` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestToken(String);

impl RequestToken {
    /// Wraps a caller-supplied token. Returns `None` for blank input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Generates a fresh token (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settlement state of a [`LedgerEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Reserved placeholder; never counted in the balance.
    Pending,
    /// Final; counted exactly once.
    Settled,
}

impl EntryState {
    /// Persisted integer code.
    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::Settled => 1,
        }
    }

    /// Decodes a persisted code.
    #[must_use]
    pub const fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Settled),
            _ => None,
        }
    }
}

/// One signed balance mutation, unique per `(user_id, token)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Owner of the balance.
    pub user_id: UserId,
    /// Idempotency token.
    pub token: RequestToken,
    /// Signed amount in the smallest currency unit. Zero while pending.
    pub delta: i64,
    /// Settlement state.
    pub state: EntryState,
}

impl LedgerEntry {
    /// Creates the pending placeholder written by a reservation.
    #[must_use]
    pub fn pending(user_id: UserId, token: RequestToken) -> Self {
        Self {
            user_id,
            token,
            delta: 0,
            state: EntryState::Pending,
        }
    }
}

/// Result of a conditional settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The pending entry was found and settled with the delta.
    Applied,
    /// Zero rows matched: unknown token, already settled, or another user's.
    NotPending,
    /// A debit would have driven the settled balance below zero.
    InsufficientFunds,
    /// The settled balance would no longer fit in an `i64`.
    Overflow,
}
