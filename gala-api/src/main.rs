use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gala_api::state::{AppState, AuthConfig};
use gala_api::{app, sweeper};
use gala_store::{EventBus, PgDirectory, PgSequenceIssuer, PgStore};
use gala_workflow::{
    BookingLifecycle, CancellationPolicyEngine, PaymentLedger, QuoteEngine, RequestLifecycle,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gala_api=debug,gala_workflow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = gala_store::Config::load().context("failed to load config")?;
    tracing::info!("starting gala API on port {}", config.server.port);

    let store = Arc::new(
        PgStore::connect(&config.database.url)
            .await
            .context("failed to connect to Postgres")?,
    );
    store.run_migrations().await.context("failed to run migrations")?;

    let sequences = Arc::new(PgSequenceIssuer::new(store.pool().clone()));
    let directory = Arc::new(PgDirectory::new(store.pool().clone()));
    let bus = EventBus::new(256);
    let sink = Arc::new(bus.clone());

    let rules = &config.business_rules;
    let refund_schedule = rules.refund_schedule().context("invalid refund tiers")?;

    let requests = Arc::new(RequestLifecycle::new(
        store.clone(),
        directory.clone(),
        directory.clone(),
        sink.clone(),
        rules.request_expiry_days,
    ));
    let bookings = Arc::new(BookingLifecycle::new(
        store.clone(),
        sequences.clone(),
        directory.clone(),
        sink.clone(),
        refund_schedule,
    ));
    let quotes = Arc::new(QuoteEngine::new(
        store.clone(),
        store.clone(),
        sequences.clone(),
        directory.clone(),
        bookings.clone(),
        sink.clone(),
        rules.quote_validity_days,
    ));
    let ledger = Arc::new(PaymentLedger::new(
        store.clone(),
        directory.clone(),
        sequences.clone(),
        sink.clone(),
    ));
    let cancellations = Arc::new(CancellationPolicyEngine::new(
        store.clone(),
        directory.clone(),
        ledger.clone(),
        sink.clone(),
    ));

    tokio::spawn(sweeper::run_expiry_sweeper(
        requests.clone(),
        rules.sweep_interval_seconds,
    ));

    let state = AppState {
        requests,
        quotes,
        bookings,
        ledger,
        cancellations,
        bus,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;
    axum::serve(listener, app(state)).await.context("server exited")?;
    Ok(())
}
