//! Run pending data migrations against the PostgreSQL document store.
//!
//! Usage: migrate-legacy-urls
//!
//! Reads the same environment as the registry server. The url split is
//! irreversible; back up the `datacenters` table first.

use datacenter_registry::config::{Config, StorageBackend};
use datacenter_registry::migration::MigrationRunner;
use datacenter_registry::store::{DocumentStore, PostgresStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    if config.storage_backend != StorageBackend::Postgres {
        anyhow::bail!("Data migrations only apply to the postgres storage backend");
    }

    let store = PostgresStore::connect(&config).await?;
    store.ensure_schema().await?;

    let applied = MigrationRunner::new().run_migrations(&store).await;
    store.close().await;

    let applied = applied?;
    info!("{} migration(s) applied", applied);

    Ok(())
}
