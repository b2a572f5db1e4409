//! Bounded retry for compensating actions.
//!
//! Compensations (notifying the user, releasing a held slot) run after the
//! order has already been cancelled, so their failure must never reach the
//! caller. Each one is tagged with an idempotency key derived from its kind
//! and the order id, retried with exponential backoff up to
//! [`RetryPolicy::max_attempts`] times, and logged if it still fails.
//!
//! With `max_attempts = 1` this degrades to a single fire-and-forget call.

use std::future::Future;
use std::time::Duration;

use crate::clients::ClientError;
use crate::domain::OrderId;

/// Retry policy for compensating actions.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `initial_delay`: 100ms
/// - `max_delay`: 2 seconds
/// - `multiplier`: 2.0
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Never below 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Backoff multiplier applied per attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default multiplier.
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            ..Self::default()
        }
    }

    /// A single attempt, no retry.
    #[must_use]
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay to wait after the failed attempt number `attempt` (1-based).
    ///
    /// `initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let (nanos, cap) = (
            (self.initial_delay.as_nanos() as f64 * self.multiplier.powi(exponent)).round(),
            self.max_delay.as_nanos() as f64,
        );
        if !nanos.is_finite() || nanos < 0.0 || nanos >= cap {
            return self.max_delay;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let nanos = nanos as u64;
        Duration::from_nanos(nanos)
    }
}

/// A compensating action and its idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationAction {
    /// Stable action name, e.g. `"cancel_slot"`.
    pub kind: &'static str,
    /// Order being compensated.
    pub order_id: OrderId,
    /// `"{kind}:{order_id}"`, sent to the collaborator on every attempt.
    pub idempotency_key: String,
}

impl CompensationAction {
    /// Creates an action with its derived idempotency key.
    #[must_use]
    pub fn new(kind: &'static str, order_id: OrderId) -> Self {
        Self {
            kind,
            order_id,
            idempotency_key: format!("{kind}:{order_id}"),
        }
    }
}

/// Runs `operation` under `policy`. Returns `true` once an attempt succeeds
/// and `false` after the last failure, which is logged and swallowed.
pub async fn run_compensation<F, Fut>(
    policy: &RetryPolicy,
    action: &CompensationAction,
    mut operation: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), ClientError>>,
{
    let mut attempt: u32 = 1;
    loop {
        match operation().await {
            Ok(()) => {
                if attempt > 1 {
                    tracing::info!(
                        kind = action.kind,
                        order_id = %action.order_id,
                        attempt,
                        "compensation succeeded after retry"
                    );
                }
                return true;
            }
            Err(err) if attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    kind = action.kind,
                    order_id = %action.order_id,
                    attempt,
                    error = %err,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "compensation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
            Err(err) => {
                tracing::error!(
                    kind = action.kind,
                    order_id = %action.order_id,
                    idempotency_key = %action.idempotency_key,
                    attempts = attempt,
                    error = %err,
                    "compensation abandoned"
                );
                return false;
            }
        }
    }
}
