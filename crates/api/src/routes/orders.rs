//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, RecordId};
use domain::Order;
use orders::OrderResult;
use serde::Deserialize;
use store::Storage;

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub record_id: String,
    /// Signed so that non-positive quantities reach validation instead of
    /// failing deserialization.
    pub quantity: i64,
}

// -- Handlers --

/// POST /orders: place an order against a record's stock.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResult>), ApiError> {
    let Json(req) = payload?;
    let record_id: RecordId = req.record_id.parse()?;
    let result = state.orders.create_order(record_id, req.quantity).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /orders: every order, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list_orders().await?))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let id: OrderId = id.parse()?;
    Ok(Json(state.orders.get_order(id).await?))
}
