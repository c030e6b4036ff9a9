use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow::anyhow!(
                "Unknown STORAGE_BACKEND '{}': expected 'postgres' or 'memory'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub storage_backend: StorageBackend,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // Build database_url from individual fields or use DATABASE_URL if provided
        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => {
                let db_host = var("DB_HOST", "localhost");
                let db_port = var("DB_PORT", "5432");
                let db_name = var("DB_NAME", "datacenter_registry");
                let db_user = var("DB_USER", "registry_user");
                let db_password = var("DB_PASSWORD", "password");

                // URL-encode password to handle special characters
                let encoded_password = urlencoding::encode(&db_password);

                format!(
                    "postgres://{}:{}@{}:{}/{}",
                    db_user, encoded_password, db_host, db_port, db_name
                )
            }
        };

        let host = var("REGISTRY_HOST", "127.0.0.1");

        let port = var("REGISTRY_PORT", "9100").parse().unwrap_or(9100);

        let max_connections = var("MAX_CONNECTIONS", "10").parse().unwrap_or(10);

        let storage_backend = var("STORAGE_BACKEND", "postgres").parse()?;

        let log_dir = PathBuf::from(var("LOG_DIR", "/var/log/datacenter-registry"));

        Ok(Config {
            database_url,
            host,
            port,
            max_connections,
            storage_backend,
            log_dir,
        })
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|e| anyhow::anyhow!("Invalid socket address: {}", e))
    }
}
