//! Datacenter Registry
//!
//! Create/read/update/delete/search over datacenter records. Validation and
//! existence checks happen here; everything else is delegated to the store.

use crate::error::{RegistryError, Result};
use crate::model::{DatacenterInput, DatacenterRecord};
use crate::query::{QueryFilters, SearchQuery};
use crate::store::{DocumentStore, StoredDatacenter};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub struct DatacenterRegistry {
    store: Arc<dyn DocumentStore>,
}

impl DatacenterRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Register a new datacenter
    pub async fn create(&self, input: DatacenterInput) -> Result<DatacenterRecord> {
        let record = DatacenterRecord::try_from(input)?;

        if self.store.find_one(&record.center_id).await?.is_some() {
            return Err(RegistryError::state_conflict(format!(
                "Datacenter '{}' already exists",
                record.center_id
            )));
        }

        let stored = self.store.insert_one(&record).await?;

        info!("Registered datacenter: {}", stored.record.center_id);
        Ok(stored.record)
    }

    pub async fn get_by_id(&self, center_id: &str) -> Result<DatacenterRecord> {
        self.find_existing(center_id).await.map(|stored| stored.record)
    }

    pub async fn get_many(&self, filters: &QueryFilters) -> Result<Vec<DatacenterRecord>> {
        let query = SearchQuery::from(filters.to_filter());
        self.find(&query).await
    }

    /// Overwrite every mutable field of an existing datacenter
    pub async fn update(&self, input: DatacenterInput) -> Result<DatacenterRecord> {
        let record = DatacenterRecord::try_from(input)?;
        let existing = self.find_existing(&record.center_id).await?;

        let stored = self.store.replace_one(&record, existing.revision).await?;

        info!(
            "Updated datacenter: {} (revision {})",
            stored.record.center_id, stored.revision
        );
        Ok(stored.record)
    }

    pub async fn delete(&self, center_id: &str) -> Result<()> {
        self.find_existing(center_id).await?;
        self.store.delete_one(center_id).await?;

        info!("Deleted datacenter: {}", center_id);
        Ok(())
    }

    /// Search with a client-supplied query body
    pub async fn advanced_search(&self, query: Option<Value>) -> Result<Vec<DatacenterRecord>> {
        let query = SearchQuery::parse(query)?;
        debug!("Advanced search with {} branches", query.branches.len());
        self.find(&query).await
    }

    /// Records matching any of the given property constraints
    pub async fn search_by_properties(&self, query: Option<Value>) -> Result<Vec<DatacenterRecord>> {
        let query = SearchQuery::parse_properties(query)?;
        debug!("Property search over {} keys", query.branches.len());
        self.find(&query).await
    }

    async fn find(&self, query: &SearchQuery) -> Result<Vec<DatacenterRecord>> {
        let found = self.store.find(query).await?;
        Ok(found.into_iter().map(|stored| stored.record).collect())
    }

    async fn find_existing(&self, center_id: &str) -> Result<StoredDatacenter> {
        self.store
            .find_one(center_id)
            .await?
            .ok_or_else(|| RegistryError::not_found("No record found for this id"))
    }
}
