//! Ledger handlers: balance, token reservation, deposit, withdrawal.

use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{BalanceResponse, DepositRequest, RequestIdResponse, WithdrawalRequest};
use crate::api::extract::{AuthUser, RequestIdHeader};
use crate::app_state::AppState;
use crate::error::{BookingError, ErrorResponse};
use crate::headers;

/// `GET /account/get` — Current settled balance.
///
/// # Errors
///
/// Returns [`BookingError`] if the caller is unauthenticated or storage
/// fails.
#[utoipa::path(
    get,
    path = "/account/get",
    tag = "Ledger",
    summary = "Get balance",
    params(("X-User-Id" = i64, Header, description = "Account owner")),
    responses(
        (status = 200, description = "Settled balance", body = BalanceResponse),
        (status = 401, description = "Missing X-User-Id", body = ErrorResponse),
    )
)]
pub async fn get_balance(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<BalanceResponse>, BookingError> {
    let balance = state.ledger.balance(user_id).await?;
    Ok(Json(BalanceResponse { balance }))
}

/// `GET /account/genreq` — Reserve a ledger token.
///
/// A caller may propose its own token in `X-Request-Id`; otherwise one is
/// generated.
///
/// # Errors
///
/// Returns [`BookingError::TokenConflict`] if the proposed token is taken.
#[utoipa::path(
    get,
    path = "/account/genreq",
    tag = "Ledger",
    summary = "Begin operation",
    description = "Reserves a pending ledger entry. The token is returned in the X-Request-Id response header and must accompany the settling deposit or withdrawal.",
    params(
        ("X-User-Id" = i64, Header, description = "Account owner"),
        ("X-Request-Id" = Option<String>, Header, description = "Token to reserve instead of a generated one"),
    ),
    responses(
        (status = 200, description = "Token reserved", body = RequestIdResponse,
            headers(("X-Request-Id" = String, description = "Reserved token"))),
        (status = 409, description = "Token already in use", body = ErrorResponse),
    )
)]
pub async fn begin_operation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    RequestIdHeader(proposed): RequestIdHeader,
) -> Result<impl IntoResponse, BookingError> {
    let token = state.ledger.begin_operation(user_id, proposed).await?;
    let request_id = HeaderValue::from_str(token.as_str())
        .map_err(|e| BookingError::Internal(format!("token is not a header value: {e}")))?;
    let user = HeaderValue::from(user_id.get());
    Ok((
        [
            (headers::REQUEST_ID, request_id),
            (headers::USER_ID, user),
        ],
        Json(RequestIdResponse {
            request_id: token.to_string(),
        }),
    ))
}

/// `POST /account/deposit` — Credit the balance under a reserved token.
///
/// # Errors
///
/// Returns [`BookingError`] when `X-Request-Id` is missing, the delta is
/// negative, or the token is not pending.
#[utoipa::path(
    post,
    path = "/account/deposit",
    tag = "Ledger",
    summary = "Deposit",
    request_body = DepositRequest,
    params(
        ("X-User-Id" = i64, Header, description = "Account owner"),
        ("X-Request-Id" = String, Header, description = "Reserved token"),
    ),
    responses(
        (status = 200, description = "Deposit settled", body = BalanceResponse),
        (status = 400, description = "Missing token, negative delta or balance limit", body = ErrorResponse),
        (status = 409, description = "Token not pending", body = ErrorResponse),
    )
)]
pub async fn deposit(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    request_id: RequestIdHeader,
    Json(req): Json<DepositRequest>,
) -> Result<Json<BalanceResponse>, BookingError> {
    let token = request_id.required()?;
    state.ledger.deposit(user_id, &token, req.delta).await?;
    let balance = state.ledger.balance(user_id).await?;
    Ok(Json(BalanceResponse { balance }))
}

/// `POST /account/withdrawal` — Debit the balance for an order.
///
/// The outcome is also reported to the order service's payment callback.
///
/// # Errors
///
/// Returns [`BookingError`] when `X-Request-Id` is missing, the amount is
/// negative or exceeds the balance, or the token is not pending.
#[utoipa::path(
    post,
    path = "/account/withdrawal",
    tag = "Ledger",
    summary = "Withdraw",
    request_body = WithdrawalRequest,
    params(
        ("X-User-Id" = i64, Header, description = "Account owner"),
        ("X-Request-Id" = String, Header, description = "Reserved token"),
    ),
    responses(
        (status = 200, description = "Withdrawal settled", body = BalanceResponse),
        (status = 400, description = "Missing token or negative amount", body = ErrorResponse),
        (status = 409, description = "Token not pending", body = ErrorResponse),
        (status = 422, description = "Insufficient funds", body = ErrorResponse),
    )
)]
pub async fn withdraw(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    request_id: RequestIdHeader,
    Json(req): Json<WithdrawalRequest>,
) -> Result<Json<BalanceResponse>, BookingError> {
    let token = request_id.required()?;
    state
        .ledger
        .withdraw(user_id, &token, req.order_id, req.withdrawal_sum)
        .await?;
    let balance = state.ledger.balance(user_id).await?;
    Ok(Json(BalanceResponse { balance }))
}

/// Ledger routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/account/get", get(get_balance))
        .route("/account/genreq", get(begin_operation))
        .route("/account/deposit", post(deposit))
        .route("/account/withdrawal", post(withdraw))
}
