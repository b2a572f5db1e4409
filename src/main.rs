//! booking-saga server entry point.
//!
//! Starts the Axum HTTP server with the order and/or ledger endpoints,
//! depending on `SERVICE_ROLE`.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use booking_saga::api;
use booking_saga::app_state::AppState;
use booking_saga::clients::{
    HttpNotifier, HttpPaymentCallbackSink, HttpPaymentGateway, HttpSlotReservation,
};
use booking_saga::config::{BookingConfig, PersistenceBackend};
use booking_saga::persistence::{
    LedgerStore, MemoryLedgerStore, MemoryOrderStore, OrderStore, PostgresLedgerStore,
    PostgresOrderStore, postgres,
};
use booking_saga::service::{Collaborators, LedgerService, OrderOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = BookingConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, role = %config.role, "starting booking-saga");

    // Build persistence layer
    let (orders, ledger): (Arc<dyn OrderStore>, Arc<dyn LedgerStore>) = match config.backend {
        PersistenceBackend::Postgres => {
            let pool = postgres::connect(&config).await?;
            if config.database_run_migrations {
                postgres::run_migrations(&pool).await?;
                tracing::info!("database migrations applied");
            }
            (
                Arc::new(PostgresOrderStore::new(pool.clone())) as Arc<dyn OrderStore>,
                Arc::new(PostgresLedgerStore::new(pool)) as Arc<dyn LedgerStore>,
            )
        }
        PersistenceBackend::Memory => {
            tracing::warn!("using in-memory persistence; state is lost on restart");
            (
                Arc::new(MemoryOrderStore::new()) as Arc<dyn OrderStore>,
                Arc::new(MemoryLedgerStore::new()) as Arc<dyn LedgerStore>,
            )
        }
    };

    // Build collaborator clients
    let http = reqwest::Client::new();
    let collaborators = Collaborators {
        slots: Arc::new(HttpSlotReservation::new(
            http.clone(),
            &config.events_service_url,
        )),
        payments: Arc::new(HttpPaymentGateway::new(
            http.clone(),
            &config.account_service_url,
        )),
        notifier: Arc::new(HttpNotifier::new(http.clone(), &config.notif_service_url)),
    };
    let callbacks = Arc::new(HttpPaymentCallbackSink::new(http, &config.orders_service_url));

    // Build service layer
    let app_state = AppState {
        orchestrator: Arc::new(OrderOrchestrator::new(
            orders,
            collaborators,
            config.compensation_policy(),
        )),
        ledger: Arc::new(LedgerService::new(ledger, callbacks)),
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router(config.role))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
