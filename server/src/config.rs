//! Configuration management for the server.

use kennel_engine::MigratePolicy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL for the `myLocalPostgres` connection
    pub database_url: String,
    /// File backing the `myLocalDisk` connection
    pub disk_path: PathBuf,
    /// Startup migrate policy applied to every collection
    pub migrate: MigratePolicy,
    /// Bound on a single adapter call
    pub adapter_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let disk_path = env::var("DISK_PATH")
            .unwrap_or_else(|_| ".tmp/localDiskDb.db".to_string())
            .into();

        let migrate = match env::var("MIGRATE") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidMigrate(value))?,
            Err(_) => MigratePolicy::default(),
        };

        let adapter_timeout = env::var("ADAPTER_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidTimeout)?;

        Ok(Self {
            host,
            port,
            database_url,
            disk_path,
            migrate,
            adapter_timeout,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid MIGRATE value '{0}', expected safe, alter or drop")]
    InvalidMigrate(String),

    #[error("Invalid ADAPTER_TIMEOUT_MS value")]
    InvalidTimeout,
}
