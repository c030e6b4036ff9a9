use crate::config::Config;
use crate::error::{RegistryError, Result};
use crate::model::DatacenterRecord;
use crate::query::{Condition, FieldPath, Filter, Scalar, SearchQuery};
use crate::store::{to_document, DocumentStore, DocumentTransform, StoredDatacenter};
use async_trait::async_trait;
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use serde_json::{json, Value};
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

const COLUMNS: &str = "center_id, doc, revision";

pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Open a pool against `config.database_url` and check it answers.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = create_pool(&config.database_url, config.max_connections)?;
        let store = Self { pool };

        store.ping().await?;
        info!("Connected to PostgreSQL document store");

        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self.pool.get().await?;

        client
            .batch_execute(
                r#"
                CREATE TABLE IF NOT EXISTS datacenters (
                    center_id TEXT PRIMARY KEY,
                    doc JSONB NOT NULL,
                    revision BIGINT NOT NULL DEFAULT 0,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX IF NOT EXISTS idx_datacenters_doc
                ON datacenters USING GIN (doc jsonb_path_ops);

                CREATE TABLE IF NOT EXISTS _datacenter_registry_migrations (
                    id SERIAL PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    documents_rewritten BIGINT NOT NULL DEFAULT 0,
                    applied_at TIMESTAMPTZ DEFAULT NOW()
                );
                "#,
            )
            .await
            .map_err(|e| RegistryError::storage("ensure_schema", e))?;

        debug!("Datacenter tables ready");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn find_one(&self, center_id: &str) -> Result<Option<StoredDatacenter>> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                &format!("SELECT {} FROM datacenters WHERE center_id = $1", COLUMNS),
                &[&center_id],
            )
            .await
            .map_err(|e| RegistryError::storage("find_one", e))?;

        row.map(|row| stored_from_row(&row)).transpose()
    }

    async fn find(&self, query: &SearchQuery) -> Result<Vec<StoredDatacenter>> {
        let client = self.pool.get().await?;

        let mut params = Vec::new();
        let predicate = query_predicate(query, &mut params);
        let sql = format!(
            "SELECT {} FROM datacenters WHERE {} ORDER BY center_id",
            COLUMNS, predicate
        );
        debug!("find: {} ({} params)", sql, params.len());

        let param_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let rows = client
            .query(&sql, &param_refs)
            .await
            .map_err(|e| RegistryError::storage("find", e))?;

        rows.iter().map(stored_from_row).collect()
    }

    async fn insert_one(&self, record: &DatacenterRecord) -> Result<StoredDatacenter> {
        let client = self.pool.get().await?;
        let doc = to_document(record)?;

        let row = client
            .query_opt(
                &format!(
                    "INSERT INTO datacenters (center_id, doc) VALUES ($1, $2) \
                     ON CONFLICT (center_id) DO NOTHING RETURNING {}",
                    COLUMNS
                ),
                &[&record.center_id, &doc],
            )
            .await
            .map_err(|e| RegistryError::storage("insert_one", e))?;

        match row {
            Some(row) => stored_from_row(&row),
            None => Err(RegistryError::state_conflict(format!(
                "Datacenter '{}' already exists",
                record.center_id
            ))),
        }
    }

    async fn replace_one(
        &self,
        record: &DatacenterRecord,
        expected_revision: i64,
    ) -> Result<StoredDatacenter> {
        let client = self.pool.get().await?;
        let doc = to_document(record)?;

        let row = client
            .query_opt(
                &format!(
                    "UPDATE datacenters SET doc = $2, revision = revision + 1, updated_at = NOW() \
                     WHERE center_id = $1 AND revision = $3 RETURNING {}",
                    COLUMNS
                ),
                &[&record.center_id, &doc, &expected_revision],
            )
            .await
            .map_err(|e| RegistryError::storage("replace_one", e))?;

        if let Some(row) = row {
            return stored_from_row(&row);
        }

        let exists = client
            .query_opt(
                "SELECT 1 FROM datacenters WHERE center_id = $1",
                &[&record.center_id],
            )
            .await
            .map_err(|e| RegistryError::storage("replace_one", e))?
            .is_some();

        if exists {
            Err(RegistryError::ConcurrentModification {
                center_id: record.center_id.clone(),
                expected_revision,
            })
        } else {
            Err(RegistryError::not_found(format!(
                "No record found for id '{}'",
                record.center_id
            )))
        }
    }

    async fn delete_one(&self, center_id: &str) -> Result<bool> {
        let client = self.pool.get().await?;

        let deleted = client
            .execute("DELETE FROM datacenters WHERE center_id = $1", &[&center_id])
            .await
            .map_err(|e| RegistryError::storage("delete_one", e))?;

        Ok(deleted > 0)
    }

    async fn ping(&self) -> Result<()> {
        let client = self.pool.get().await.map_err(|e| RegistryError::ConnectionFailed {
            target: "postgres".to_string(),
            cause: e.to_string(),
        })?;

        client
            .execute("SELECT 1", &[])
            .await
            .map_err(|e| RegistryError::ConnectionFailed {
                target: "postgres".to_string(),
                cause: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }

    async fn applied_migrations(&self) -> Result<Vec<String>> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT name FROM _datacenter_registry_migrations ORDER BY id",
                &[],
            )
            .await
            .map_err(|e| RegistryError::storage("applied_migrations", e))?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn apply_migration(&self, name: &str, transform: DocumentTransform) -> Result<usize> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        // Claiming the ledger row first keeps concurrent runners from both applying it
        let claimed = tx
            .query_opt(
                "INSERT INTO _datacenter_registry_migrations (name) VALUES ($1) \
                 ON CONFLICT (name) DO NOTHING RETURNING id",
                &[&name],
            )
            .await
            .map_err(|e| RegistryError::storage("apply_migration", e))?;

        if claimed.is_none() {
            debug!("Migration {} already applied", name);
            return Ok(0);
        }

        let rows = tx
            .query(
                "SELECT center_id, doc FROM datacenters ORDER BY center_id FOR UPDATE",
                &[],
            )
            .await
            .map_err(|e| RegistryError::storage("apply_migration", e))?;

        let mut rewritten: usize = 0;
        for row in &rows {
            let center_id: String = row.get(0);
            let mut doc: Value = row.get(1);

            let changed = match doc.as_object_mut() {
                Some(map) => transform(map),
                None => false,
            };
            if !changed {
                continue;
            }

            tx.execute(
                "UPDATE datacenters SET doc = $2, revision = revision + 1, updated_at = NOW() \
                 WHERE center_id = $1",
                &[&center_id, &doc],
            )
            .await
            .map_err(|e| RegistryError::storage("apply_migration", e))?;

            debug!("Migration {} rewrote {}", name, center_id);
            rewritten += 1;
        }

        tx.execute(
            "UPDATE _datacenter_registry_migrations SET documents_rewritten = $2 WHERE name = $1",
            &[&name, &(rewritten as i64)],
        )
        .await
        .map_err(|e| RegistryError::storage("apply_migration", e))?;

        tx.commit().await?;

        Ok(rewritten)
    }

    async fn close(&self) {
        self.pool.close();
        info!("PostgreSQL pool closed");
    }
}

fn stored_from_row(row: &Row) -> Result<StoredDatacenter> {
    let center_id: String = row.get("center_id");
    StoredDatacenter::from_document(&center_id, row.get("doc"), row.get("revision"))
}

/// Translate a query into a SQL predicate over `doc`.
///
/// Every accepted value becomes a JSONB containment test against a bound
/// parameter, so client input never reaches the SQL text.
fn query_predicate(query: &SearchQuery, params: &mut Vec<Value>) -> String {
    if query.branches.is_empty() {
        return "FALSE".to_string();
    }

    let branches: Vec<String> = query
        .branches
        .iter()
        .map(|filter| filter_predicate(filter, params))
        .collect();

    format!("({})", branches.join(" OR "))
}

fn filter_predicate(filter: &Filter, params: &mut Vec<Value>) -> String {
    if filter.conditions.is_empty() {
        return "TRUE".to_string();
    }

    let conditions: Vec<String> = filter
        .conditions
        .iter()
        .map(|condition| condition_predicate(condition, params))
        .collect();

    format!("({})", conditions.join(" AND "))
}

fn condition_predicate(condition: &Condition, params: &mut Vec<Value>) -> String {
    let mut alternatives = Vec::new();

    for scalar in &condition.accepted {
        for pattern in containment_patterns(&condition.path, scalar) {
            params.push(pattern);
            alternatives.push(format!("doc @> ${}", params.len()));
        }
    }

    if alternatives.is_empty() {
        return "FALSE".to_string();
    }

    format!("({})", alternatives.join(" OR "))
}

/// JSONB documents whose containment means `path` matches `scalar`.
///
/// Strings on property paths also match inside string lists.
fn containment_patterns(path: &FieldPath, scalar: &Scalar) -> Vec<Value> {
    let value = scalar.to_json();

    match path {
        FieldPath::Record(field) => vec![json!({ field.as_str(): value })],
        FieldPath::Property(key) => {
            let mut patterns = vec![json!({ "properties": { key.as_str(): value.clone() } })];
            if let Scalar::Text(_) = scalar {
                patterns.push(json!({ "properties": { key.as_str(): [value] } }));
            }
            patterns
        }
    }
}

fn create_pool(database_url: &str, max_size: u32) -> Result<Pool> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(database_url.to_string());

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size: max_size as usize,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(5)),
            recycle: Some(Duration::from_secs(5)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| RegistryError::Internal(format!("Failed to create pool: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryFilters, RecordField};

    #[test]
    fn test_match_all_predicate() {
        let mut params = Vec::new();
        assert_eq!(query_predicate(&SearchQuery::all(), &mut params), "(TRUE)");
        assert!(params.is_empty());
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let mut params = Vec::new();
        let query = SearchQuery { branches: vec![] };
        assert_eq!(query_predicate(&query, &mut params), "FALSE");
    }

    #[test]
    fn test_filters_become_bound_containment() {
        let filters = QueryFilters {
            country: Some(vec!["CA".to_string(), "US".to_string()]),
            center_type: Some(vec!["RDPC".to_string()]),
            ..Default::default()
        };

        let mut params = Vec::new();
        let sql = query_predicate(&SearchQuery::from(filters.to_filter()), &mut params);

        assert_eq!(sql, "(((doc @> $1 OR doc @> $2) AND (doc @> $3)))");
        assert_eq!(
            params,
            vec![
                json!({"country": "CA"}),
                json!({"country": "US"}),
                json!({"type": "RDPC"}),
            ]
        );
    }

    #[test]
    fn test_property_text_also_matches_lists() {
        let query = SearchQuery::from(Filter {
            conditions: vec![Condition::new(
                FieldPath::Property("zones".to_string()),
                vec![Scalar::Text("a".to_string()), Scalar::Bool(true)],
            )],
        });

        let mut params = Vec::new();
        let sql = query_predicate(&query, &mut params);

        assert_eq!(sql, "(((doc @> $1 OR doc @> $2 OR doc @> $3)))");
        assert_eq!(
            params,
            vec![
                json!({"properties": {"zones": "a"}}),
                json!({"properties": {"zones": ["a"]}}),
                json!({"properties": {"zones": true}}),
            ]
        );
    }

    #[test]
    fn test_hostile_values_stay_in_params() {
        let query = SearchQuery::from(Filter {
            conditions: vec![Condition::new(
                FieldPath::Record(RecordField::Name),
                vec![Scalar::Text("x'); DROP TABLE datacenters; --".to_string())],
            )],
        });

        let mut params = Vec::new();
        let sql = query_predicate(&query, &mut params);

        assert!(!sql.contains("DROP"));
        assert_eq!(params[0]["name"], "x'); DROP TABLE datacenters; --");
    }

    #[test]
    fn test_empty_membership_is_false() {
        let query = SearchQuery::from(Filter {
            conditions: vec![Condition::new(FieldPath::Record(RecordField::Country), vec![])],
        });

        let mut params = Vec::new();
        assert_eq!(query_predicate(&query, &mut params), "((FALSE))");
    }

    #[test]
    fn test_property_key_kept_whole_in_pattern() {
        let query = SearchQuery::from(Filter {
            conditions: vec![Condition::new(
                FieldPath::property("storage.region"),
                vec![Scalar::Bool(true)],
            )],
        });

        let mut params = Vec::new();
        query_predicate(&query, &mut params);

        assert_eq!(params, vec![json!({"properties": {"storage.region": true}})]);
    }
}
