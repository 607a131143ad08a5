//! HTTP API server for the record catalog and order backend.
//!
//! Provides REST endpoints for catalog records and orders, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use cache::CacheLayer;
use catalog::{MetadataProvider, RecordCatalogService};
use metrics_exporter_prometheus::PrometheusHandle;
use orders::OrderTransactionCoordinator;
use retry::RetryEngine;
use store::Storage;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Metadata provider shared by every request.
pub type SharedProvider = Arc<dyn MetadataProvider>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Storage> {
    pub catalog: RecordCatalogService<S, SharedProvider>,
    pub orders: OrderTransactionCoordinator<S>,
    pub store: S,
}

impl<S: Storage> AppState<S> {
    /// Wires the catalog service and order coordinator over one store.
    pub fn new(store: S, cache: CacheLayer, retry: RetryEngine, provider: SharedProvider) -> Self {
        Self {
            catalog: RecordCatalogService::new(store.clone(), cache, retry, provider),
            orders: OrderTransactionCoordinator::new(store.clone()),
            store,
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Storage>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/records",
            get(routes::records::list::<S>).post(routes::records::create::<S>),
        )
        .route(
            "/records/{id}",
            get(routes::records::get::<S>)
                .put(routes::records::update::<S>)
                .delete(routes::records::delete::<S>),
        )
        .route(
            "/orders",
            get(routes::orders::list::<S>).post(routes::orders::create::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
