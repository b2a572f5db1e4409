//! `OpenAPI` document for the order and ledger endpoints.

use axum::Json;
use utoipa::OpenApi;

/// `OpenAPI` documentation for every route the crate can mount.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "booking-saga",
        version = env!("CARGO_PKG_VERSION"),
        description = "Order orchestration saga and idempotent two-phase ledger."
    ),
    paths(
        crate::api::handlers::orders::create_order,
        crate::api::handlers::orders::list_orders,
        crate::api::handlers::orders::slot_callback,
        crate::api::handlers::orders::payment_callback,
        crate::api::handlers::ledger::get_balance,
        crate::api::handlers::ledger::begin_operation,
        crate::api::handlers::ledger::deposit,
        crate::api::handlers::ledger::withdraw,
        crate::api::handlers::system::health_handler,
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            crate::error::ErrorBody,
            crate::domain::Order,
            crate::domain::OrderStatus,
        )
    ),
    tags(
        (name = "Orders", description = "Order creation and listing"),
        (name = "Callbacks", description = "Collaborator callbacks driving the saga"),
        (name = "Ledger", description = "Two-phase balance operations"),
        (name = "System", description = "Health"),
    ),
)]
pub struct ApiDoc;

/// Returns the generated `OpenAPI` spec.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// `GET /openapi.json`
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}
