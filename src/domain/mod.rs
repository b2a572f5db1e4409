//! Domain layer: identifiers, orders, ledger entries, and the saga
//! transition table.
//!
//! Nothing in here performs I/O. Persistence and outbound calls live in
//! [`crate::persistence`] and [`crate::clients`].

pub mod callbacks;
pub mod ids;
pub mod ledger_entry;
pub mod order;
pub mod saga;

pub use callbacks::{PaymentCallback, SlotCallback};
pub use ids::{EventId, OrderId, UserId};
pub use ledger_entry::{EntryState, LedgerEntry, RequestToken, SettleOutcome};
pub use order::{Order, OrderStatus};
pub use saga::{Notice, SagaAction, SagaEvent, Step, decide};
