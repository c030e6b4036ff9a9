//! Document storage backends
//!
//! Records are kept as JSON documents keyed by `centerId`, next to a revision
//! counter used for optimistic concurrency.
//!
//! - [`PostgresStore`]: JSONB documents in PostgreSQL
//! - [`MemoryStore`]: in-process documents, for tests and local runs

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::error::{RegistryError, Result};
use crate::model::DatacenterRecord;
use crate::query::SearchQuery;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Rewrites one raw document in place, returning whether it changed.
pub type DocumentTransform = fn(&mut Map<String, Value>) -> bool;

/// A record together with its storage metadata
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDatacenter {
    pub record: DatacenterRecord,
    pub revision: i64,
}

impl StoredDatacenter {
    pub fn from_document(center_id: &str, doc: Value, revision: i64) -> Result<Self> {
        let record = serde_json::from_value(doc).map_err(|e| {
            RegistryError::storage("decode", format!("document '{}': {}", center_id, e))
        })?;

        Ok(Self { record, revision })
    }
}

pub fn to_document(record: &DatacenterRecord) -> Result<Value> {
    Ok(serde_json::to_value(record)?)
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, center_id: &str) -> Result<Option<StoredDatacenter>>;

    /// All documents matching `query`, ordered by `centerId`
    async fn find(&self, query: &SearchQuery) -> Result<Vec<StoredDatacenter>>;

    /// Fails with `StateConflict` if the `centerId` is taken.
    async fn insert_one(&self, record: &DatacenterRecord) -> Result<StoredDatacenter>;

    /// Replace the document for `record.center_id` if its revision is still
    /// `expected_revision`.
    async fn replace_one(
        &self,
        record: &DatacenterRecord,
        expected_revision: i64,
    ) -> Result<StoredDatacenter>;

    async fn delete_one(&self, center_id: &str) -> Result<bool>;

    async fn ping(&self) -> Result<()>;

    async fn applied_migrations(&self) -> Result<Vec<String>>;

    /// Apply `transform` to every document and record `name` as applied.
    /// Returns the number of documents rewritten.
    async fn apply_migration(&self, name: &str, transform: DocumentTransform) -> Result<usize>;

    async fn close(&self);
}
