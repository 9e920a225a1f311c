//! Application configuration loaded from environment variables.

use std::path::PathBuf;

use crate::errors::{MarketError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_url: String,
    /// Maximum number of pooled SQLite connections
    pub db_max_connections: u32,
    /// Port for the REST API server
    pub api_port: u16,
    /// The single email allowed to mutate the project catalog
    pub admin_email: String,
    /// Upper bound for `GET /registry?limit=`
    pub registry_max_limit: u32,
    /// Prefix prepended to the 6-digit registry serial number
    pub serial_prefix: String,
    /// Optional JSON file of projects loaded into the catalog at start-up
    pub seed_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let admin_email = env_var("ADMIN_EMAIL").map_err(|_| {
            MarketError::Config("ADMIN_EMAIL environment variable is required".to_string())
        })?;
        if admin_email.trim().is_empty() {
            return Err(MarketError::Config("ADMIN_EMAIL must not be empty".to_string()));
        }

        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./marketplace.db".to_string()),
            db_max_connections: env_var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| MarketError::Config("Invalid DB_MAX_CONNECTIONS".to_string()))?,
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| MarketError::Config("Invalid API_PORT".to_string()))?,
            admin_email,
            registry_max_limit: env_var("REGISTRY_MAX_LIMIT")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .map_err(|_| MarketError::Config("Invalid REGISTRY_MAX_LIMIT".to_string()))?,
            serial_prefix: env_var("SERIAL_PREFIX").unwrap_or_else(|_| "VCU-".to_string()),
            seed_file: env_var("SEED_FILE").ok().map(PathBuf::from),
        })
    }

    /// Configuration used by the in-crate tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            api_port: 0,
            admin_email: "admin@ecotrade.test".to_string(),
            registry_max_limit: 100,
            serial_prefix: "VCU-".to_string(),
            seed_file: None,
        }
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| MarketError::Config(format!("Missing env var: {key}")))
}
