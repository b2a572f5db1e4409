//! Data Transfer Objects for REST request/response serialization.

pub mod ledger_dto;
pub mod order_dto;

pub use ledger_dto::*;
pub use order_dto::*;
