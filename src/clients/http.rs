//! `reqwest` adapters for the collaborator ports.
//!
//! Requests are sent once: no timeout, retry or backoff is applied here.
//! Retrying compensations is the caller's decision (see
//! [`crate::service::compensation`]).

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;

use super::{ClientError, Notifier, PaymentCallbackSink, PaymentGateway, SlotReservation};
use crate::domain::{Order, OrderId, PaymentCallback, RequestToken, UserId};
use crate::headers;

/// Sends a prepared request and maps transport failures and non-2xx
/// statuses to [`ClientError`].
async fn send(endpoint: &str, request: RequestBuilder) -> Result<Response, ClientError> {
    let response = request
        .send()
        .await
        .map_err(|e| ClientError::Transport {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

fn join(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

/// Reservation service client (`/events/occupy`, `/events/cancel`).
#[derive(Debug, Clone)]
pub struct HttpSlotReservation {
    client: Client,
    occupy_url: String,
    cancel_url: String,
}

impl HttpSlotReservation {
    /// Creates a client for the reservation service at `base_url`.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            occupy_url: join(base_url, "/events/occupy"),
            cancel_url: join(base_url, "/events/cancel"),
        }
    }
}

#[async_trait]
impl SlotReservation for HttpSlotReservation {
    async fn occupy(&self, order: &Order) -> Result<(), ClientError> {
        let request = self
            .client
            .post(&self.occupy_url)
            .header(headers::USER_ID, order.user_id.to_string())
            .json(&json!({ "order_id": order.id, "event_id": order.event_id }));
        send(&self.occupy_url, request).await.map(drop)
    }

    async fn cancel(&self, order: &Order, idempotency_key: &str) -> Result<(), ClientError> {
        let request = self
            .client
            .post(&self.cancel_url)
            .header(headers::USER_ID, order.user_id.to_string())
            .header(headers::IDEMPOTENCY_KEY, idempotency_key)
            .json(&json!({ "order_id": order.id, "event_id": order.event_id }));
        send(&self.cancel_url, request).await.map(drop)
    }
}

/// Notification service client (`/notif/create`).
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
    create_url: String,
}

impl HttpNotifier {
    /// Creates a client for the notification service at `base_url`.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            create_url: join(base_url, "/notif/create"),
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(
        &self,
        user_id: UserId,
        order_id: OrderId,
        message: &str,
        idempotency_key: &str,
    ) -> Result<(), ClientError> {
        let request = self
            .client
            .post(&self.create_url)
            .header(headers::USER_ID, user_id.to_string())
            .header(headers::IDEMPOTENCY_KEY, idempotency_key)
            .json(&json!({ "order_id": order_id, "message": message }));
        send(&self.create_url, request).await.map(drop)
    }
}

/// Ledger client used by the orchestrator (`/account/genreq`,
/// `/account/withdrawal`).
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    genreq_url: String,
    withdrawal_url: String,
}

impl HttpPaymentGateway {
    /// Creates a client for the ledger service at `base_url`.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            genreq_url: join(base_url, "/account/genreq"),
            withdrawal_url: join(base_url, "/account/withdrawal"),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn begin_operation(&self, user_id: UserId) -> Result<RequestToken, ClientError> {
        let request = self
            .client
            .get(&self.genreq_url)
            .header(headers::USER_ID, user_id.to_string());
        let response = send(&self.genreq_url, request).await?;

        response
            .headers()
            .get(headers::REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .and_then(RequestToken::parse)
            .ok_or_else(|| ClientError::MissingHeader {
                endpoint: self.genreq_url.clone(),
                header: headers::REQUEST_ID,
            })
    }

    async fn withdraw(
        &self,
        user_id: UserId,
        token: &RequestToken,
        order_id: OrderId,
        amount: i64,
    ) -> Result<(), ClientError> {
        let request = self
            .client
            .post(&self.withdrawal_url)
            .header(headers::USER_ID, user_id.to_string())
            .header(headers::REQUEST_ID, token.as_str())
            .json(&json!({ "order_id": order_id, "withdrawal_sum": amount }));
        send(&self.withdrawal_url, request).await.map(drop)
    }
}

/// Delivers withdrawal outcomes to the orders service
/// (`/orders/callback/account`).
#[derive(Debug, Clone)]
pub struct HttpPaymentCallbackSink {
    client: Client,
    callback_url: String,
}

impl HttpPaymentCallbackSink {
    /// Creates a sink posting to the orders service at `base_url`.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            callback_url: join(base_url, "/orders/callback/account"),
        }
    }
}

#[async_trait]
impl PaymentCallbackSink for HttpPaymentCallbackSink {
    async fn deliver(&self, callback: &PaymentCallback) -> Result<(), ClientError> {
        let request = self
            .client
            .post(&self.callback_url)
            .header(headers::USER_ID, callback.user_id.to_string())
            .json(callback);
        send(&self.callback_url, request).await.map(drop)
    }
}
