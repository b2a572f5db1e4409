//! Ledger endpoint DTOs.
//!
//! Amounts are plain JSON integers in the smallest currency unit.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::OrderId;

/// Response body for `GET /account/get` and the mutation endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    /// Sum of settled entries.
    pub balance: i64,
}

/// Response body for `GET /account/genreq`. The same token is also
/// returned in the `X-Request-Id` header.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequestIdResponse {
    /// Reserved ledger token.
    pub request_id: String,
}

/// Request body for `POST /account/deposit`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DepositRequest {
    /// Amount to credit; must not be negative.
    pub delta: i64,
}

/// Request body for `POST /account/withdrawal`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawalRequest {
    /// Order being paid for.
    pub order_id: OrderId,
    /// Amount to debit.
    pub withdrawal_sum: i64,
}
