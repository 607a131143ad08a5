//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use catalog::CatalogError;
use common::IdParseError;
use domain::{DomainError, Record};
use orders::OrderError;
use serde::Serialize;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Catalog operation error.
    Catalog(CatalogError),
    /// Order operation error.
    Order(OrderError),
}

/// Identity of the record a conflicting write collided with.
#[derive(Debug, Serialize)]
struct ExistingRecord<'a> {
    id: String,
    artist: &'a str,
    album: &'a str,
    format: &'static str,
    mbid: Option<&'a str>,
}

impl<'a> From<&'a Record> for ExistingRecord<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            id: record.id.to_string(),
            artist: &record.artist,
            album: &record.album,
            format: record.format.as_str(),
            mbid: record.mbid.as_deref(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(msg)),
            ApiError::Catalog(err) => catalog_error_to_response(err),
            ApiError::Order(err) => order_error_to_response(err),
        };
        (status, axum::Json(body)).into_response()
    }
}

fn error_body(message: impl Into<String>) -> serde_json::Value {
    serde_json::json!({ "error": message.into() })
}

fn catalog_error_to_response(err: CatalogError) -> (StatusCode, serde_json::Value) {
    match &err {
        CatalogError::Validation(_) => (StatusCode::BAD_REQUEST, error_body(err.to_string())),
        CatalogError::NotFound(_) => (StatusCode::NOT_FOUND, error_body(err.to_string())),
        CatalogError::Conflict(existing) => (
            StatusCode::CONFLICT,
            serde_json::json!({
                "error": err.to_string(),
                "existing": ExistingRecord::from(existing.as_ref()),
            }),
        ),
        CatalogError::Upstream(upstream) => {
            let status = StatusCode::from_u16(upstream.status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                tracing::error!(error = %upstream, "metadata provider failure");
            }
            (status, error_body(err.to_string()))
        }
        CatalogError::Internal(_) => {
            tracing::error!(error = %err, "internal server error");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(err.to_string()))
        }
    }
}

fn order_error_to_response(err: OrderError) -> (StatusCode, serde_json::Value) {
    let status = match &err {
        OrderError::Validation(_) | OrderError::InsufficientStock { .. } => {
            StatusCode::BAD_REQUEST
        }
        OrderError::NotFound(_) => StatusCode::NOT_FOUND,
        OrderError::Internal(_) => {
            tracing::error!(error = %err, "internal server error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, error_body(err.to_string()))
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Catalog(err)
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Catalog(err.into())
    }
}

impl From<IdParseError> for ApiError {
    fn from(err: IdParseError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
