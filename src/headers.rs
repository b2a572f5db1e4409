//! Correlation headers shared by every service in the booking flow.

/// Authenticated principal. Required on every protected endpoint.
pub const USER_ID: &str = "X-User-Id";

/// Ledger idempotency token.
pub const REQUEST_ID: &str = "X-Request-Id";

/// Deduplication key attached to compensating calls so retries can be
/// recognised by the receiving service.
pub const IDEMPOTENCY_KEY: &str = "Idempotency-Key";
