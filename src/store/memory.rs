use crate::error::{RegistryError, Result};
use crate::model::DatacenterRecord;
use crate::query::SearchQuery;
use crate::store::{to_document, DocumentStore, DocumentTransform, StoredDatacenter};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

struct DocumentEntry {
    doc: Value,
    revision: i64,
}

impl DocumentEntry {
    fn new(doc: Value) -> Self {
        Self { doc, revision: 0 }
    }

    fn to_stored(&self, center_id: &str) -> Result<StoredDatacenter> {
        StoredDatacenter::from_document(center_id, self.doc.clone(), self.revision)
    }
}

/// In-process document store
#[derive(Default)]
pub struct MemoryStore {
    documents: DashMap<String, DocumentEntry>,
    /// Applied migration name -> documents it rewrote
    migrations: DashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw document without validation, replacing any existing one.
    pub fn insert_document(&self, center_id: &str, doc: Value) {
        self.documents.insert(center_id.to_string(), DocumentEntry::new(doc));
    }

    /// Raw document for `center_id`, if present
    pub fn document(&self, center_id: &str) -> Option<Value> {
        self.documents.get(center_id).map(|entry| entry.doc.clone())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, center_id: &str) -> Result<Option<StoredDatacenter>> {
        self.documents
            .get(center_id)
            .map(|entry| entry.to_stored(center_id))
            .transpose()
    }

    async fn find(&self, query: &SearchQuery) -> Result<Vec<StoredDatacenter>> {
        let mut found = self
            .documents
            .iter()
            .filter(|entry| query.matches(&entry.value().doc))
            .map(|entry| entry.value().to_stored(entry.key()))
            .collect::<Result<Vec<_>>>()?;

        found.sort_by(|a, b| a.record.center_id.cmp(&b.record.center_id));
        Ok(found)
    }

    async fn insert_one(&self, record: &DatacenterRecord) -> Result<StoredDatacenter> {
        let doc = to_document(record)?;

        match self.documents.entry(record.center_id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::state_conflict(format!(
                "Datacenter '{}' already exists",
                record.center_id
            ))),
            Entry::Vacant(vacant) => {
                let entry = vacant.insert(DocumentEntry::new(doc));
                entry.to_stored(&record.center_id)
            }
        }
    }

    async fn replace_one(
        &self,
        record: &DatacenterRecord,
        expected_revision: i64,
    ) -> Result<StoredDatacenter> {
        let doc = to_document(record)?;

        let mut entry = self.documents.get_mut(&record.center_id).ok_or_else(|| {
            RegistryError::not_found(format!("No record found for id '{}'", record.center_id))
        })?;

        if entry.revision != expected_revision {
            return Err(RegistryError::ConcurrentModification {
                center_id: record.center_id.clone(),
                expected_revision,
            });
        }

        entry.doc = doc;
        entry.revision += 1;
        entry.to_stored(&record.center_id)
    }

    async fn delete_one(&self, center_id: &str) -> Result<bool> {
        Ok(self.documents.remove(center_id).is_some())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn applied_migrations(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.migrations.iter().map(|m| m.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn apply_migration(&self, name: &str, transform: DocumentTransform) -> Result<usize> {
        if self.migrations.contains_key(name) {
            debug!("Migration {} already applied", name);
            return Ok(0);
        }

        let mut rewritten = 0;
        for mut entry in self.documents.iter_mut() {
            let changed = match entry.doc.as_object_mut() {
                Some(map) => transform(map),
                None => false,
            };
            if changed {
                entry.revision += 1;
                rewritten += 1;
            }
        }

        self.migrations.insert(name.to_string(), rewritten);
        Ok(rewritten)
    }

    async fn close(&self) {}
}
