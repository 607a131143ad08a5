//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::{AppState, SharedProvider};
use catalog::MusicBrainzProvider;
use metrics_exporter_prometheus::PrometheusHandle;
use retry::RetryEngine;
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PgStore, Storage, TransactionMode};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve<S: Storage>(
    store: S,
    config: &Config,
    provider: SharedProvider,
    metrics_handle: PrometheusHandle,
) {
    let cache = cache::connect(&config.cache)
        .await
        .expect("failed to set up cache");
    let retry = RetryEngine::new(config.retry.clone());
    let state = Arc::new(AppState::new(store, cache, retry, provider));
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Metadata provider
    let provider: SharedProvider = Arc::new(
        MusicBrainzProvider::new(&config.metadata_base_url, config.metadata_timeout)
            .expect("failed to build metadata client"),
    );

    // 4. Select the store and run
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to database");
            let store = PgStore::with_mode(pool, config.transaction_mode);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!(mode = config.transaction_mode.as_str(), "using postgres store");
            serve(store, &config, provider, metrics_handle).await;
        }
        None => {
            let store = match config.transaction_mode {
                TransactionMode::Transactional => InMemoryStore::new(),
                TransactionMode::Sequential => InMemoryStore::sequential(),
            };
            tracing::info!(mode = config.transaction_mode.as_str(), "using in-memory store");
            serve(store, &config, provider, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
