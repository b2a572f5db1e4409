//! Ports to the collaborating services and their HTTP adapters.
//!
//! The orchestrator and the ledger only see the traits below; [`http`]
//! implements them with `reqwest` against the wire contract of the
//! reservation, notification, ledger and order services. Tests plug in
//! recording fakes instead.

pub mod http;

use async_trait::async_trait;

use crate::domain::{Order, OrderId, PaymentCallback, RequestToken, UserId};

pub use http::{
    HttpNotifier, HttpPaymentCallbackSink, HttpPaymentGateway, HttpSlotReservation,
};

/// Failure of an outbound call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The request could not be sent or the response could not be read.
    #[error("transport error calling {endpoint}: {message}")]
    Transport {
        /// Target URL.
        endpoint: String,
        /// Underlying error text.
        message: String,
    },

    /// The collaborator answered with a non-success status.
    #[error("{endpoint} answered {status}")]
    Status {
        /// Target URL.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// A required response header was absent.
    #[error("{endpoint} response lacks {header}")]
    MissingHeader {
        /// Target URL.
        endpoint: String,
        /// Header name.
        header: &'static str,
    },
}

/// Slot-reservation service: owns per-event capacity.
#[async_trait]
pub trait SlotReservation: Send + Sync + std::fmt::Debug {
    /// Asks for a slot of `order.event_id` keyed by `order.id`. The outcome
    /// arrives later as a [`crate::domain::SlotCallback`].
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request was not accepted.
    async fn occupy(&self, order: &Order) -> Result<(), ClientError>;

    /// Releases the slot held for `order.id`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request was not accepted.
    async fn cancel(&self, order: &Order, idempotency_key: &str) -> Result<(), ClientError>;
}

/// Notification service: records a message against an order.
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Stores `message` for `user_id` about `order_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request was not accepted.
    async fn notify(
        &self,
        user_id: UserId,
        order_id: OrderId,
        message: &str,
        idempotency_key: &str,
    ) -> Result<(), ClientError>;
}

/// Ledger as seen from the orchestrator.
#[async_trait]
pub trait PaymentGateway: Send + Sync + std::fmt::Debug {
    /// Reserves a fresh ledger token for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if no token was issued.
    async fn begin_operation(&self, user_id: UserId) -> Result<RequestToken, ClientError>;

    /// Requests a debit of `amount` for `order_id` under `token`. The
    /// settlement outcome arrives later as a [`PaymentCallback`].
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the ledger refused the request.
    async fn withdraw(
        &self,
        user_id: UserId,
        token: &RequestToken,
        order_id: OrderId,
        amount: i64,
    ) -> Result<(), ClientError>;
}

/// Where the ledger reports withdrawal outcomes.
#[async_trait]
pub trait PaymentCallbackSink: Send + Sync + std::fmt::Debug {
    /// Delivers one withdrawal outcome.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if delivery failed.
    async fn deliver(&self, callback: &PaymentCallback) -> Result<(), ClientError>;
}
