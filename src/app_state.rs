//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::{LedgerService, OrderOrchestrator};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Order lifecycle and saga driver.
    pub orchestrator: Arc<OrderOrchestrator>,
    /// Two-phase balance ledger.
    pub ledger: Arc<LedgerService>,
}
