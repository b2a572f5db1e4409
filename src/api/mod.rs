//! REST API layer: route handlers, DTOs, extractors, and router composition.
//!
//! Paths follow the wire contract of the collaborating services
//! (`/orders/*`, `/account/*`) and are mounted at the root.

pub mod dto;
pub mod extract;
pub mod handlers;
pub mod openapi;

use axum::Router;
use axum::routing::get;

use crate::app_state::AppState;
use crate::config::ServiceRole;

/// Builds the API router for `role`, plus health and the `OpenAPI` document.
pub fn build_router(role: ServiceRole) -> Router<AppState> {
    let router = Router::new()
        .merge(handlers::routes(role))
        .merge(handlers::system::routes())
        .route("/openapi.json", get(openapi::openapi_json));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", openapi::openapi()),
    );

    router
}
