//! HTTP contract checks for the order and ledger routers.

#![allow(clippy::panic)]

mod support;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;

use booking_saga::api::build_router;
use booking_saga::app_state::AppState;
use booking_saga::clients::{Notifier, SlotReservation};
use booking_saga::config::ServiceRole;
use booking_saga::domain::EventId;
use booking_saga::persistence::{MemoryLedgerStore, MemoryOrderStore};
use booking_saga::service::{Collaborators, LedgerService, OrderOrchestrator, RetryPolicy};
use support::{FakeEvents, InProcessLedger, QueueSink, RecordingNotifier};

fn test_router(role: ServiceRole) -> Router {
    let (tx, _rx) = mpsc::unbounded_channel();
    let ledger = Arc::new(LedgerService::new(
        Arc::new(MemoryLedgerStore::new()),
        Arc::new(QueueSink(tx)),
    ));
    let events = Arc::new(FakeEvents::default());
    events.add_event(EventId::new(1), 5, 100);
    let collaborators = Collaborators {
        slots: events as Arc<dyn SlotReservation>,
        payments: Arc::new(InProcessLedger(Arc::clone(&ledger))),
        notifier: Arc::new(RecordingNotifier::default()) as Arc<dyn Notifier>,
    };
    let state = AppState {
        orchestrator: Arc::new(OrderOrchestrator::new(
            Arc::new(MemoryOrderStore::new()),
            collaborators,
            RetryPolicy::once(),
        )),
        ledger,
    };
    build_router(role).with_state(state)
}

struct Call<'a> {
    method: Method,
    uri: &'a str,
    user: Option<&'a str>,
    request_id: Option<&'a str>,
    body: Option<Value>,
}

impl<'a> Call<'a> {
    fn get(uri: &'a str) -> Self {
        Self {
            method: Method::GET,
            uri,
            user: None,
            request_id: None,
            body: None,
        }
    }

    fn post(uri: &'a str, body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::get(uri)
        }
    }

    fn user(mut self, user: &'a str) -> Self {
        self.user = Some(user);
        self
    }

    fn request_id(mut self, request_id: &'a str) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

struct Reply {
    status: StatusCode,
    request_id: Option<String>,
    body: Value,
}

async fn send(router: &Router, call: Call<'_>) -> Reply {
    let mut builder = Request::builder().method(call.method).uri(call.uri);
    if let Some(user) = call.user {
        builder = builder.header("X-User-Id", user);
    }
    if let Some(request_id) = call.request_id {
        builder = builder.header("X-Request-Id", request_id);
    }
    let request = match call.body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    };
    let Ok(request) = request else {
        panic!("request should build");
    };

    let Ok(response) = router.clone().oneshot(request).await else {
        panic!("router is infallible");
    };
    let status = response.status();
    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
        panic!("body should be readable");
    };
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Reply {
        status,
        request_id,
        body,
    }
}

async fn reserve(router: &Router, user: &str) -> String {
    let reply = send(router, Call::get("/account/genreq").user(user)).await;
    assert_eq!(reply.status, StatusCode::OK);
    let Some(token) = reply.request_id else {
        panic!("genreq must return X-Request-Id");
    };
    token
}

#[tokio::test]
async fn protected_routes_require_user_header() {
    let router = test_router(ServiceRole::All);
    for call in [
        Call::get("/orders/get"),
        Call::get("/account/get"),
        Call::get("/account/genreq"),
        Call::post("/orders/create", json!({"event_id": 1})),
        Call::post(
            "/orders/callback/events",
            json!({"order_id": 1, "user_id": 1, "price": 1, "status": true}),
        ),
    ] {
        let uri = call.uri;
        let reply = send(&router, call).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(reply.body["error"]["code"], 1000);
    }
}

#[tokio::test]
async fn non_numeric_user_is_rejected() {
    let router = test_router(ServiceRole::All);
    let reply = send(&router, Call::get("/orders/get").user("bob")).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn genreq_returns_token_in_header_and_body() {
    let router = test_router(ServiceRole::Ledger);
    let reply = send(&router, Call::get("/account/genreq").user("7")).await;

    assert_eq!(reply.status, StatusCode::OK);
    let Some(token) = reply.request_id else {
        panic!("missing X-Request-Id");
    };
    assert!(!token.is_empty());
    assert_eq!(reply.body["request_id"], token.as_str());
}

#[tokio::test]
async fn deposit_then_balance() {
    let router = test_router(ServiceRole::Ledger);
    let token = reserve(&router, "7").await;

    let reply = send(&router, Call::get("/account/get").user("7")).await;
    assert_eq!(reply.body["balance"], 0);

    let deposit = Call::post("/account/deposit", json!({"delta": 120}))
        .user("7")
        .request_id(&token);
    let reply = send(&router, deposit).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["balance"], 120);

    let replay = Call::post("/account/deposit", json!({"delta": 120}))
        .user("7")
        .request_id(&token);
    assert_eq!(send(&router, replay).await.status, StatusCode::CONFLICT);

    let reply = send(&router, Call::get("/account/get").user("7")).await;
    assert_eq!(reply.body["balance"], 120);
}

#[tokio::test]
async fn ledger_mutations_require_request_id() {
    let router = test_router(ServiceRole::Ledger);
    let deposit = Call::post("/account/deposit", json!({"delta": 5})).user("7");
    let reply = send(&router, deposit).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["code"], 1002);

    let withdrawal =
        Call::post("/account/withdrawal", json!({"order_id": 1, "withdrawal_sum": 5})).user("7");
    assert_eq!(send(&router, withdrawal).await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn negative_deposit_is_rejected() {
    let router = test_router(ServiceRole::Ledger);
    let token = reserve(&router, "7").await;
    let deposit = Call::post("/account/deposit", json!({"delta": -1}))
        .user("7")
        .request_id(&token);
    assert_eq!(send(&router, deposit).await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deposit_past_balance_limit_is_rejected_and_balance_stays_readable() {
    let router = test_router(ServiceRole::Ledger);
    for expected in [StatusCode::OK, StatusCode::BAD_REQUEST] {
        let token = reserve(&router, "7").await;
        let deposit = Call::post("/account/deposit", json!({"delta": i64::MAX}))
            .user("7")
            .request_id(&token);
        let reply = send(&router, deposit).await;
        assert_eq!(reply.status, expected);
    }

    let token = reserve(&router, "7").await;
    let deposit = Call::post("/account/deposit", json!({"delta": 1}))
        .user("7")
        .request_id(&token);
    let reply = send(&router, deposit).await;
    assert_eq!(reply.body["error"]["code"], 1004);

    let reply = send(&router, Call::get("/account/get").user("7")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["balance"], i64::MAX);
}

#[tokio::test]
async fn overdraft_is_unprocessable_and_keeps_balance() {
    let router = test_router(ServiceRole::Ledger);
    let token = reserve(&router, "7").await;
    let deposit = Call::post("/account/deposit", json!({"delta": 10}))
        .user("7")
        .request_id(&token);
    assert_eq!(send(&router, deposit).await.status, StatusCode::OK);

    let token = reserve(&router, "7").await;
    let withdrawal = Call::post(
        "/account/withdrawal",
        json!({"order_id": 3, "withdrawal_sum": 11}),
    )
    .user("7")
    .request_id(&token);
    let reply = send(&router, withdrawal).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.body["error"]["code"], 4001);

    let reply = send(&router, Call::get("/account/get").user("7")).await;
    assert_eq!(reply.body["balance"], 10);
}

#[tokio::test]
async fn created_order_is_listed_waiting_for_slot() {
    let router = test_router(ServiceRole::Orders);
    let reply = send(
        &router,
        Call::post("/orders/create", json!({"event_id": 1})).user("3"),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    let order_id = reply.body["order_id"].clone();
    assert!(order_id.is_i64());

    let reply = send(&router, Call::get("/orders/get").user("3")).await;
    assert_eq!(reply.status, StatusCode::OK);
    let Some(orders) = reply.body.as_array() else {
        panic!("list must be an array");
    };
    assert_eq!(orders.len(), 1);
    assert_eq!(orders.first().map(|o| &o["id"]), Some(&order_id));
    assert_eq!(orders.first().map(|o| &o["status"]), Some(&json!("needs_slot")));

    let reply = send(&router, Call::get("/orders/get").user("4")).await;
    assert_eq!(reply.body, json!([]));
}

#[tokio::test]
async fn callback_for_unknown_order_is_not_found() {
    let router = test_router(ServiceRole::Orders);
    let callback = Call::post(
        "/orders/callback/account",
        json!({"order_id": 999, "user_id": 1, "price": 10, "status": true}),
    )
    .user("1");
    assert_eq!(send(&router, callback).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn role_limits_mounted_routes() {
    let orders_only = test_router(ServiceRole::Orders);
    let reply = send(&orders_only, Call::get("/account/get").user("1")).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let ledger_only = test_router(ServiceRole::Ledger);
    let reply = send(&ledger_only, Call::get("/orders/get").user("1")).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_openapi_are_public() {
    let router = test_router(ServiceRole::Orders);
    let reply = send(&router, Call::get("/health")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "healthy");

    let reply = send(&router, Call::get("/openapi.json")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body["paths"]["/account/withdrawal"].is_object());
}
