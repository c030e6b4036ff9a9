//! One-time data migrations over stored datacenter documents
//!
//! Each migration runs once per store; applied names are kept in the store's
//! migration ledger. There is no rollback.

use crate::error::Result;
use crate::store::{DocumentStore, DocumentTransform};
use serde_json::{Map, Value};
use tracing::{debug, info};

#[derive(Clone, Copy)]
pub struct DataMigration {
    pub name: &'static str,
    pub transform: DocumentTransform,
}

/// Split the legacy single `url` into `songUrl` and `scoreUrl`.
pub const SPLIT_SONG_SCORE_URLS: DataMigration = DataMigration {
    name: "20210805195658-split-song-score-urls",
    transform: split_legacy_url,
};

/// All data migrations, in application order
pub const DATA_MIGRATIONS: &[DataMigration] = &[SPLIT_SONG_SCORE_URLS];

/// Documents with a non-empty string `url` get both service URLs set to it
/// and lose `url`. Anything else is left alone.
pub fn split_legacy_url(doc: &mut Map<String, Value>) -> bool {
    let url = match doc.get("url") {
        Some(Value::String(url)) if !url.is_empty() => url.clone(),
        _ => return false,
    };

    doc.insert("songUrl".to_string(), Value::String(url.clone()));
    doc.insert("scoreUrl".to_string(), Value::String(url));
    doc.remove("url");
    true
}

pub struct MigrationRunner {
    migrations: &'static [DataMigration],
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self {
            migrations: DATA_MIGRATIONS,
        }
    }

    /// Apply every migration the store has not seen yet. Returns how many ran.
    pub async fn run_migrations(&self, store: &dyn DocumentStore) -> Result<usize> {
        let applied = store.applied_migrations().await?;
        debug!("Store has {} applied migrations", applied.len());

        let mut count = 0;

        for migration in self.migrations {
            if applied.iter().any(|name| name == migration.name) {
                debug!("Skipping already applied migration: {}", migration.name);
                continue;
            }

            info!("Applying migration: {}", migration.name);
            let rewritten = store
                .apply_migration(migration.name, migration.transform)
                .await?;

            count += 1;
            info!(
                "Successfully applied migration: {} ({} documents rewritten)",
                migration.name, rewritten
            );
        }

        Ok(count)
    }
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn test_split_legacy_url() {
        let mut doc = object(json!({"centerId": "CA", "url": "https://x"}));
        assert!(split_legacy_url(&mut doc));
        assert_eq!(
            Value::Object(doc),
            json!({"centerId": "CA", "songUrl": "https://x", "scoreUrl": "https://x"})
        );
    }

    #[test]
    fn test_split_leaves_other_documents() {
        let untouched = vec![
            json!({"centerId": "A", "songUrl": "s", "scoreUrl": "t"}),
            json!({"centerId": "B", "url": ""}),
            json!({"centerId": "C", "url": null}),
        ];

        for original in untouched {
            let mut doc = object(original.clone());
            assert!(!split_legacy_url(&mut doc));
            assert_eq!(Value::Object(doc), original);
        }
    }

    #[test]
    fn test_split_overwrites_existing_urls() {
        let mut doc = object(json!({"url": "https://new", "songUrl": "https://old"}));
        assert!(split_legacy_url(&mut doc));
        assert_eq!(doc["songUrl"], "https://new");
        assert_eq!(doc["scoreUrl"], "https://new");
    }

    #[tokio::test]
    async fn test_runner_migrates_legacy_records_once() {
        let store = MemoryStore::new();
        store.insert_document(
            "CA-TORONTO",
            json!({
                "centerId": "CA-TORONTO",
                "country": "CA",
                "name": "Toronto",
                "type": "RDPC",
                "organization": "OICR",
                "storageType": "S3",
                "contactEmail": "ops@example.org",
                "url": "https://x"
            }),
        );

        let runner = MigrationRunner::new();
        assert_eq!(runner.run_migrations(&store).await.unwrap(), 1);
        assert_eq!(runner.run_migrations(&store).await.unwrap(), 0);
        assert_eq!(
            store.applied_migrations().await.unwrap(),
            vec!["20210805195658-split-song-score-urls"]
        );

        let doc = store.document("CA-TORONTO").unwrap();
        assert_eq!(doc["songUrl"], "https://x");
        assert_eq!(doc["scoreUrl"], "https://x");
        assert!(doc.get("url").is_none());

        // The migrated document now decodes as a full record
        let stored = store.find_one("CA-TORONTO").await.unwrap().unwrap();
        assert_eq!(stored.record.song_url, "https://x");
        assert_eq!(stored.revision, 1);
    }
}
