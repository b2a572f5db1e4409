//! Order handlers: create, list, and the two collaborator callbacks.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{CallbackAck, CreateOrderRequest, CreateOrderResponse};
use crate::api::extract::AuthUser;
use crate::app_state::AppState;
use crate::domain::{Order, PaymentCallback, SlotCallback};
use crate::error::{BookingError, ErrorResponse};

/// `POST /orders/create` — Create an order and start its saga.
///
/// # Errors
///
/// Returns [`BookingError`] if the caller is unauthenticated or the order
/// could not be persisted.
#[utoipa::path(
    post,
    path = "/orders/create",
    tag = "Orders",
    summary = "Create an order",
    description = "Persists an order for the given event and synchronously drives it until it waits on a collaborator. Failures after persistence are reflected in the order status.",
    request_body = CreateOrderRequest,
    params(("X-User-Id" = i64, Header, description = "Authenticated user")),
    responses(
        (status = 200, description = "Order created", body = CreateOrderResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 401, description = "Missing X-User-Id", body = ErrorResponse),
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, BookingError> {
    let order = state
        .orchestrator
        .create_order(user_id, req.event_id)
        .await?;
    Ok(Json(CreateOrderResponse { order_id: order.id }))
}

/// `GET /orders/get` — List the caller's orders.
///
/// # Errors
///
/// Returns [`BookingError`] if the caller is unauthenticated or storage
/// fails.
#[utoipa::path(
    get,
    path = "/orders/get",
    tag = "Orders",
    summary = "List orders",
    params(("X-User-Id" = i64, Header, description = "Authenticated user")),
    responses(
        (status = 200, description = "Orders owned by the caller", body = Vec<Order>),
        (status = 401, description = "Missing X-User-Id", body = ErrorResponse),
    )
)]
pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Order>>, BookingError> {
    Ok(Json(state.orchestrator.list_orders(user_id).await?))
}

/// `POST /orders/callback/events` — Slot reservation outcome.
///
/// # Errors
///
/// Returns [`BookingError`] for an unknown order, a payload that does not
/// match it, or a storage failure.
#[utoipa::path(
    post,
    path = "/orders/callback/events",
    tag = "Callbacks",
    summary = "Slot reservation callback",
    description = "Called by the reservation service. Duplicates and late deliveries are accepted and ignored.",
    request_body = SlotCallback,
    params(("X-User-Id" = i64, Header, description = "Order owner")),
    responses(
        (status = 200, description = "Callback applied", body = CallbackAck),
        (status = 404, description = "Unknown order", body = ErrorResponse),
    )
)]
pub async fn slot_callback(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Json(callback): Json<SlotCallback>,
) -> Result<Json<CallbackAck>, BookingError> {
    let status = state.orchestrator.on_slot_callback(&callback).await?;
    Ok(Json(CallbackAck {
        order_id: callback.order_id,
        status,
    }))
}

/// `POST /orders/callback/account` — Payment settlement outcome.
///
/// # Errors
///
/// Returns [`BookingError`] for an unknown order, a payload that does not
/// match it, or a storage failure.
#[utoipa::path(
    post,
    path = "/orders/callback/account",
    tag = "Callbacks",
    summary = "Payment callback",
    description = "Called by the ledger after a withdrawal. Duplicates and late deliveries are accepted and ignored.",
    request_body = PaymentCallback,
    params(("X-User-Id" = i64, Header, description = "Order owner")),
    responses(
        (status = 200, description = "Callback applied", body = CallbackAck),
        (status = 404, description = "Unknown order", body = ErrorResponse),
    )
)]
pub async fn payment_callback(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Json(callback): Json<PaymentCallback>,
) -> Result<Json<CallbackAck>, BookingError> {
    let status = state.orchestrator.on_payment_callback(&callback).await?;
    Ok(Json(CallbackAck {
        order_id: callback.order_id,
        status,
    }))
}

/// Order routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders/create", post(create_order))
        .route("/orders/get", get(list_orders))
        .route("/orders/callback/events", post(slot_callback))
        .route("/orders/callback/account", post(payment_callback))
}
