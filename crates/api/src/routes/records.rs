//! Catalog record endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::RecordId;
use domain::{NewRecord, Page, Pagination, Record, RecordFilter, RecordUpdate};
use store::Storage;

use crate::AppState;
use crate::error::ApiError;

/// Parses `page`/`limit` and the filter fields out of a listing query.
fn parse_listing(
    mut params: HashMap<String, String>,
) -> Result<(RecordFilter, Pagination), ApiError> {
    let defaults = Pagination::default();
    let page = parse_number(params.remove("page"), "page", defaults.page)?;
    let limit = parse_number(params.remove("limit"), "limit", defaults.limit)?;
    let pagination = Pagination::new(page, limit)?;
    let filter = RecordFilter::from_pairs(params)?;
    Ok((filter, pagination))
}

fn parse_number(value: Option<String>, name: &str, default: u32) -> Result<u32, ApiError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("{name} must be a positive integer"))),
    }
}

/// GET /records: one page of records matching the query filters.
#[tracing::instrument(skip(state, query))]
pub async fn list<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<Page<Record>>, ApiError> {
    let Query(params) = query?;
    let (filter, pagination) = parse_listing(params)?;
    let page = state.catalog.find_all(filter, pagination).await?;
    Ok(Json(page))
}

/// GET /records/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Record>, ApiError> {
    let id: RecordId = id.parse()?;
    Ok(Json(state.catalog.find_by_id(id).await?))
}

/// POST /records: create a record, enriching it when an mbid is given.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<NewRecord>, JsonRejection>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    let Json(record) = payload?;
    let created = state.catalog.create(record).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /records/{id}: partial update; absent fields are left untouched.
#[tracing::instrument(skip(state, payload))]
pub async fn update<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<RecordUpdate>, JsonRejection>,
) -> Result<Json<Record>, ApiError> {
    let id: RecordId = id.parse()?;
    let Json(update) = payload?;
    Ok(Json(state.catalog.update(id, update).await?))
}

/// DELETE /records/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: RecordId = id.parse()?;
    state.catalog.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn listing_defaults_to_first_page() {
        let (filter, pagination) = parse_listing(HashMap::new()).unwrap();
        assert_eq!(filter, RecordFilter::new());
        assert_eq!(pagination, Pagination::default());
    }

    #[test]
    fn listing_splits_paging_from_filters() {
        let (filter, pagination) =
            parse_listing(params(&[("artist", "Björk"), ("page", "2"), ("limit", "5")])).unwrap();
        assert_eq!(filter.artist.as_deref(), Some("Björk"));
        assert_eq!(pagination, Pagination::new(2, 5).unwrap());
    }

    #[test]
    fn listing_rejects_bad_paging() {
        assert!(parse_listing(params(&[("page", "first")])).is_err());
        assert!(parse_listing(params(&[("limit", "0")])).is_err());
        assert!(parse_listing(params(&[("format", "wax cylinder")])).is_err());
    }
}
