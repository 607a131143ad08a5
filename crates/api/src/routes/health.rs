//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use store::{Storage, TransactionContext};

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// How the store runs order scopes: `transactional` or `sequential`.
    pub transactions: &'static str,
}

/// GET /health: reports liveness and the store's transaction mode.
pub async fn check<S: Storage>(State(state): State<Arc<AppState<S>>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        transactions: state.store.transaction_mode().as_str(),
    })
}
