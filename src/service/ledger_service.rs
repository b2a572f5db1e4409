//! Ledger service: the two-phase reserve/settle balance protocol.
//!
//! A caller first reserves a token ([`LedgerService::begin_operation`]),
//! then settles a signed delta against it exactly once. Settlement is a
//! conditional update on the pending entry, so retries and duplicates with
//! the same token can never apply twice; the second attempt reports
//! [`BookingError::NotPending`].
//!
//! Withdrawals are the one exception to that report: replaying the exact
//! debit that already settled answers with the original success, so an
//! order resumed after a crash is not cancelled for a payment that went
//! through.

use std::sync::Arc;

use crate::clients::PaymentCallbackSink;
use crate::domain::{EntryState, OrderId, PaymentCallback, RequestToken, SettleOutcome, UserId};
use crate::error::BookingError;
use crate::persistence::LedgerStore;

/// Per-user balances kept as a log of settled entries.
#[derive(Debug, Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    callbacks: Arc<dyn PaymentCallbackSink>,
}

impl LedgerService {
    /// Creates a ledger over `store` reporting withdrawals to `callbacks`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, callbacks: Arc<dyn PaymentCallbackSink>) -> Self {
        Self { store, callbacks }
    }

    /// Reserves `token` (or a freshly generated one) for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::TokenConflict`] if the token is already in
    /// use for this user, or a storage error.
    pub async fn begin_operation(
        &self,
        user_id: UserId,
        token: Option<RequestToken>,
    ) -> Result<RequestToken, BookingError> {
        let token = token.unwrap_or_else(RequestToken::generate);
        self.store.reserve(user_id, &token).await?;
        tracing::debug!(%user_id, request_id = %token, "ledger token reserved");
        Ok(token)
    }

    /// Current settled balance.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn balance(&self, user_id: UserId) -> Result<i64, BookingError> {
        self.store.balance(user_id).await
    }

    /// Settles a signed `delta` against a reserved token.
    ///
    /// Negative deltas go through the debit path, which refuses to drive
    /// the balance below zero.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidRequest`] for a delta that cannot be
    /// negated, or a storage error.
    pub async fn settle(
        &self,
        user_id: UserId,
        token: &RequestToken,
        delta: i64,
    ) -> Result<SettleOutcome, BookingError> {
        if delta >= 0 {
            return self.store.settle(user_id, token, delta).await;
        }
        let amount = delta
            .checked_neg()
            .ok_or_else(|| BookingError::InvalidRequest(format!("delta {delta} out of range")))?;
        self.store.settle_debit(user_id, token, amount).await
    }

    /// Credits `delta` to the balance.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NegativeAmount`] for a negative delta,
    /// [`BookingError::BalanceOverflow`] if the balance could not hold the
    /// credit, [`BookingError::NotPending`] if the token is not pending, or
    /// a storage error.
    pub async fn deposit(
        &self,
        user_id: UserId,
        token: &RequestToken,
        delta: i64,
    ) -> Result<(), BookingError> {
        if delta < 0 {
            return Err(BookingError::NegativeAmount(delta));
        }
        match self.settle(user_id, token, delta).await? {
            SettleOutcome::Applied => {
                tracing::info!(%user_id, request_id = %token, delta, "deposit settled");
                Ok(())
            }
            SettleOutcome::Overflow => {
                tracing::warn!(%user_id, request_id = %token, delta, "deposit refused, balance limit");
                Err(BookingError::BalanceOverflow)
            }
            SettleOutcome::NotPending | SettleOutcome::InsufficientFunds => {
                Err(BookingError::NotPending)
            }
        }
    }

    /// Debits `amount` for `order_id` and reports the outcome to the order
    /// service. Exactly one callback is dispatched per call, success or not,
    /// on a background task.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NegativeAmount`],
    /// [`BookingError::InsufficientFunds`], [`BookingError::NotPending`] or
    /// a storage error. The callback carries `status: false` in every such
    /// case.
    pub async fn withdraw(
        &self,
        user_id: UserId,
        token: &RequestToken,
        order_id: OrderId,
        amount: i64,
    ) -> Result<(), BookingError> {
        let result = if amount < 0 {
            Err(BookingError::NegativeAmount(amount))
        } else {
            self.debit(user_id, token, amount).await
        };

        match &result {
            Ok(()) => tracing::info!(%user_id, %order_id, amount, "withdrawal settled"),
            Err(err) => tracing::warn!(%user_id, %order_id, amount, error = %err, "withdrawal refused"),
        }

        self.dispatch(PaymentCallback {
            order_id,
            user_id,
            price: amount,
            status: result.is_ok(),
        });
        result
    }

    async fn debit(
        &self,
        user_id: UserId,
        token: &RequestToken,
        amount: i64,
    ) -> Result<(), BookingError> {
        match self.store.settle_debit(user_id, token, amount).await? {
            SettleOutcome::Applied => Ok(()),
            SettleOutcome::InsufficientFunds => Err(BookingError::InsufficientFunds),
            SettleOutcome::Overflow => Err(BookingError::BalanceOverflow),
            SettleOutcome::NotPending => {
                let entry = self.store.entry(user_id, token).await?;
                match entry {
                    Some(entry)
                        if entry.state == EntryState::Settled
                            && entry.delta == amount.saturating_neg() =>
                    {
                        tracing::info!(%user_id, request_id = %token, amount, "withdrawal replayed, no-op");
                        Ok(())
                    }
                    _ => Err(BookingError::NotPending),
                }
            }
        }
    }

    fn dispatch(&self, callback: PaymentCallback) {
        let sink = Arc::clone(&self.callbacks);
        tokio::spawn(async move {
            if let Err(err) = sink.deliver(&callback).await {
                tracing::error!(
                    order_id = %callback.order_id,
                    status = callback.status,
                    error = %err,
                    "failed to deliver payment callback"
                );
            }
        });
    }
}
