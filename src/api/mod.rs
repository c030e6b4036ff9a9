mod datacenters;
mod health;

pub use datacenters::{
    advanced_search, create_datacenter, delete_datacenter, get_datacenter, list_datacenters,
    search_by_properties, update_datacenter,
};
pub use health::health_check;

use crate::registry::DatacenterRegistry;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state for all endpoints
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DatacenterRegistry>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(registry: Arc<DatacenterRegistry>) -> Self {
        Self {
            registry,
            start_time: Instant::now(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/datacenters", get(list_datacenters).post(create_datacenter))
        .route("/search/datacenters", post(advanced_search))
        .route("/search/datacenters/properties", post(search_by_properties))
        .route(
            "/datacenters/:center_id",
            get(get_datacenter)
                .put(update_datacenter)
                .delete(delete_datacenter),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
