//! # booking-saga
//!
//! Order orchestration saga and idempotent two-phase ledger for booking
//! event slots.
//!
//! An order is driven through slot reservation and payment by a pure
//! transition table ([`domain::decide`]) and a single driver
//! ([`service::OrderOrchestrator`]). Every status change is a
//! compare-and-swap on the persisted row, so duplicate or late callbacks
//! are harmless. The ledger ([`service::LedgerService`]) applies each
//! reserved token at most once and never lets a balance go negative.
//!
//! ## Architecture
//!
//! ```text
//! Clients, collaborating services (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── OrderOrchestrator, LedgerService (service/)
//!     ├── Saga transition table (domain/)
//!     │
//!     ├── Collaborator ports + reqwest adapters (clients/)
//!     │
//!     └── PostgreSQL or in-memory stores (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod clients;
pub mod config;
pub mod domain;
pub mod error;
pub mod headers;
pub mod persistence;
pub mod service;
