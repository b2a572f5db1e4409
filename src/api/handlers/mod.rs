//! REST endpoint handlers organized by service.

pub mod ledger;
pub mod orders;
pub mod system;

use axum::Router;

use crate::app_state::AppState;
use crate::config::ServiceRole;

/// Composes the resource routes served by `role`.
pub fn routes(role: ServiceRole) -> Router<AppState> {
    let mut router = Router::new();
    if role.serves_orders() {
        router = router.merge(orders::routes());
    }
    if role.serves_ledger() {
        router = router.merge(ledger::routes());
    }
    router
}
