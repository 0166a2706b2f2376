//! # TickUp API Server
//!
//! HTTP API for the TickUp task manager: accounts, tasks with collaborators
//! and invitations, and OTP password reset.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p tickup-api
//! ```
//!
//! Set `STORE=memory` to run without PostgreSQL, and `LOG_FORMAT=json` for
//! machine-readable logs.

use anyhow::Context;
use std::sync::Arc;
use tickup_api::{
    app::{build_router, AppState, Backends},
    config::{Config, StoreKind},
};
use tickup_shared::{
    clock::SystemClock,
    db::{
        migrations::run_migrations,
        pool::{create_pool, DatabaseConfig},
    },
    notify::{
        relay::{RelayConfig, RelayNotifier},
        LogNotifier, Notifier,
    },
    otp::spawn_sweeper,
    store::{memory::MemoryStore, postgres::PgStore, TaskStore, UserStore},
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const RELAY_TIMEOUT_SECONDS: u64 = 10;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tickup_api=debug,tickup_shared=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn open_store(config: &Config) -> anyhow::Result<(Arc<dyn UserStore>, Arc<dyn TaskStore>)> {
    match (config.store, &config.database) {
        (StoreKind::Postgres, Some(db)) => {
            let pool = create_pool(DatabaseConfig {
                url: db.url.clone(),
                max_connections: db.max_connections,
                ..DatabaseConfig::default()
            })
            .await
            .context("Failed to connect to PostgreSQL")?;

            run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            let store = Arc::new(PgStore::new(pool));
            let users: Arc<dyn UserStore> = store.clone();
            let tasks: Arc<dyn TaskStore> = store;
            Ok((users, tasks))
        }
        (StoreKind::Postgres, None) => anyhow::bail!("DATABASE_URL is required for STORE=postgres"),
        (StoreKind::Memory, _) => {
            tracing::warn!("Using in-memory store; all data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            let users: Arc<dyn UserStore> = store.clone();
            let tasks: Arc<dyn TaskStore> = store;
            Ok((users, tasks))
        }
    }
}

fn build_notifier(config: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    match (&config.mail.relay_url, &config.mail.relay_secret) {
        (Some(url), Some(secret)) => {
            let relay = RelayNotifier::new(RelayConfig {
                url: url.clone(),
                secret: secret.clone(),
                from: config.mail.from.clone(),
                timeout: std::time::Duration::from_secs(RELAY_TIMEOUT_SECONDS),
            })?;
            tracing::info!(relay = %url, "Sending notifications through mail relay");
            Ok(Arc::new(relay))
        }
        _ => {
            tracing::warn!("MAIL_RELAY_URL not set; notifications will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("TickUp API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Invalid configuration")?;
    let bind_address = config.bind_address();
    let sweep_every = std::time::Duration::from_secs(config.otp.sweep_interval_seconds);

    let (users, tasks) = open_store(&config).await?;
    let notifier = build_notifier(&config)?;

    let state = AppState::new(
        config,
        Backends::new(users, tasks, notifier, Arc::new(SystemClock)),
    );

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(state.otp.clone(), sweep_every, shutdown.clone());

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "OTP sweeper ended abnormally");
    }

    tracing::info!("Server stopped");
    Ok(())
}
