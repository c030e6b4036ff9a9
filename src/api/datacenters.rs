//! Datacenter API endpoints
//!
//! - GET /datacenters - List datacenters, filtered by comma-separated lists
//! - POST /datacenters - Register a datacenter
//! - GET /datacenters/:center_id - Fetch one datacenter
//! - PUT /datacenters/:center_id - Replace a datacenter
//! - DELETE /datacenters/:center_id - Remove a datacenter
//! - POST /search/datacenters - Advanced search
//! - POST /search/datacenters/properties - Search by properties

use crate::api::AppState;
use crate::error::{RegistryError, Result};
use crate::model::{DatacenterInput, DatacenterRecord};
use crate::query::QueryFilters;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize)]
pub struct ListDatacentersResponse {
    pub datacenters: Vec<DatacenterRecord>,
    pub count: usize,
}

impl From<Vec<DatacenterRecord>> for ListDatacentersResponse {
    fn from(datacenters: Vec<DatacenterRecord>) -> Self {
        let count = datacenters.len();
        Self { datacenters, count }
    }
}

// === List ===

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDatacentersQuery {
    pub country: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub center_type: Option<String>,
    pub center_id: Option<String>,
}

impl ListDatacentersQuery {
    fn into_filters(self) -> QueryFilters {
        QueryFilters {
            country: self.country.as_deref().map(split_list),
            name: self.name.as_deref().map(split_list),
            center_type: self.center_type.as_deref().map(split_list),
            center_id: self.center_id.as_deref().map(split_list),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn list_datacenters(
    State(state): State<AppState>,
    Query(query): Query<ListDatacentersQuery>,
) -> Result<impl IntoResponse> {
    let records = state.registry.get_many(&query.into_filters()).await?;
    Ok((StatusCode::OK, Json(ListDatacentersResponse::from(records))))
}

// === Create / Read / Update / Delete ===

pub async fn create_datacenter(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let input = parse_input(&body)?;
    let record = state.registry.create(input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_datacenter(
    State(state): State<AppState>,
    Path(center_id): Path<String>,
) -> Result<impl IntoResponse> {
    let record = state.registry.get_by_id(&center_id).await?;
    Ok((StatusCode::OK, Json(record)))
}

pub async fn update_datacenter(
    State(state): State<AppState>,
    Path(center_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let mut input = parse_input(&body)?;

    // The path id fills in a missing body id but never overrides a different one
    match input.center_id.take().filter(|id| !id.is_empty()) {
        Some(body_id) if body_id != center_id => {
            return Err(RegistryError::invalid_argument(format!(
                "centerId '{}' in body does not match '{}' in path",
                body_id, center_id
            )));
        }
        _ => input.center_id = Some(center_id),
    }

    let record = state.registry.update(input).await?;
    Ok((StatusCode::OK, Json(record)))
}

pub async fn delete_datacenter(
    State(state): State<AppState>,
    Path(center_id): Path<String>,
) -> Result<impl IntoResponse> {
    state.registry.delete(&center_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// === Search ===

pub async fn advanced_search(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let records = state.registry.advanced_search(parse_query(&body)?).await?;
    Ok((StatusCode::OK, Json(ListDatacentersResponse::from(records))))
}

pub async fn search_by_properties(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let records = state
        .registry
        .search_by_properties(parse_query(&body)?)
        .await?;
    Ok((StatusCode::OK, Json(ListDatacentersResponse::from(records))))
}

/// Bodies are parsed by hand so malformed JSON is reported as an invalid
/// argument rather than an extractor rejection.
fn parse_input(body: &[u8]) -> Result<DatacenterInput> {
    serde_json::from_slice(body).map_err(|e| RegistryError::invalid_argument(format!(
        "Request body is not a valid datacenter: {}",
        e
    )))
}

/// An empty body is treated as an absent query.
fn parse_query(body: &[u8]) -> Result<Option<Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| RegistryError::invalid_argument(format!("Request body is not valid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("CA, US,,UK "), vec!["CA", "US", "UK"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_query_into_filters() {
        let query = ListDatacentersQuery {
            country: Some("CA,US".to_string()),
            center_type: Some(String::new()),
            ..Default::default()
        };

        let filters = query.into_filters();
        assert_eq!(filters.country, Some(vec!["CA".to_string(), "US".to_string()]));
        assert_eq!(filters.center_type, Some(vec![]));
        assert_eq!(filters.name, None);
    }

    #[test]
    fn test_parse_query() {
        assert_eq!(parse_query(b"").unwrap(), None);
        assert_eq!(parse_query(b" \n").unwrap(), None);
        assert_eq!(parse_query(b"null").unwrap(), Some(Value::Null));
        assert!(parse_query(b"{not json").is_err());
    }
}
