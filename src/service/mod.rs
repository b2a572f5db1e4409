//! Service layer: business logic orchestration.
//!
//! [`OrderOrchestrator`] drives orders through the fulfillment saga,
//! [`LedgerService`] implements the two-phase balance protocol, and
//! [`compensation`] retries the compensating actions of a failed saga.

pub mod compensation;
pub mod ledger_service;
pub mod orchestrator;

pub use compensation::{CompensationAction, RetryPolicy, run_compensation};
pub use ledger_service::LedgerService;
pub use orchestrator::{Collaborators, OrderOrchestrator};
