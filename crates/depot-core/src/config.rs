//! Configuration module
//!
//! Environment-driven configuration for the API and services: server, database,
//! upload tuning, dedup scope, and the storage-provider descriptor source.
//! Storage-provider configuration is owned by the surrounding platform; Depot
//! only consumes descriptor records (see `STORAGE_PROVIDERS`).

use std::env;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FILE_SIZE, DEFAULT_SESSION_TTL_HOURS,
};
use crate::models::provider::StorageProviderDescriptor;

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Scope within which identical content hashes are deduplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupScope {
    /// Any tenant may match any completed attachment.
    Global,
    /// Matches are restricted to the caller's tenant.
    Tenant,
    /// Matches are restricted to the tenant and business association.
    Business,
}

impl FromStr for DedupScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "global" => Ok(DedupScope::Global),
            "tenant" => Ok(DedupScope::Tenant),
            "business" => Ok(DedupScope::Business),
            _ => Err(anyhow::anyhow!("Invalid dedup scope: {}", s)),
        }
    }
}

/// Service configuration loaded from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// Fixed chunk size handed to clients at initiation.
    pub chunk_size: i64,
    pub max_file_size: i64,
    pub dedup_scope: DedupScope,
    /// Lifetime of an Uploading session before the sweeper cancels it.
    pub session_ttl_hours: i64,
    /// Interval between cleanup sweeps; 0 disables the sweeper.
    pub cleanup_interval_secs: u64,
    /// JSON array of storage-provider descriptors, supplied by the platform.
    pub storage_providers_json: Option<String>,
    /// Fallback local backend when no descriptor document is supplied.
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let chunk_size = env::var("UPLOAD_CHUNK_SIZE_BYTES")
            .unwrap_or_else(|_| DEFAULT_CHUNK_SIZE.to_string())
            .parse::<i64>()
            .unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size <= 0 {
            return Err(anyhow::anyhow!("UPLOAD_CHUNK_SIZE_BYTES must be positive"));
        }

        Ok(Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            environment,
            database_url: env::var("DATABASE_URL").ok(),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            chunk_size,
            max_file_size: env::var("UPLOAD_MAX_FILE_SIZE_BYTES")
                .unwrap_or_else(|_| DEFAULT_MAX_FILE_SIZE.to_string())
                .parse()
                .unwrap_or(DEFAULT_MAX_FILE_SIZE),
            dedup_scope: env::var("UPLOAD_DEDUP_SCOPE")
                .unwrap_or_else(|_| "tenant".to_string())
                .parse()?,
            session_ttl_hours: env::var("UPLOAD_SESSION_TTL_HOURS")
                .unwrap_or_else(|_| DEFAULT_SESSION_TTL_HOURS.to_string())
                .parse()
                .unwrap_or(DEFAULT_SESSION_TTL_HOURS),
            cleanup_interval_secs: env::var("CLEANUP_INTERVAL_SECS")
                .unwrap_or_else(|_| CLEANUP_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(CLEANUP_INTERVAL_SECS),
            storage_providers_json: env::var("STORAGE_PROVIDERS").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
        })
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Parse the provider descriptor document supplied by the platform.
    /// Returns an empty list when none is configured; callers decide whether
    /// to fall back to `local_storage_path`.
    pub fn provider_descriptors(
        &self,
    ) -> Result<Vec<StorageProviderDescriptor>, anyhow::Error> {
        match self.storage_providers_json.as_deref() {
            Some(json) => serde_json::from_str(json)
                .map_err(|e| anyhow::anyhow!("Invalid STORAGE_PROVIDERS document: {}", e)),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_scope_parsing() {
        assert_eq!("tenant".parse::<DedupScope>().unwrap(), DedupScope::Tenant);
        assert_eq!("GLOBAL".parse::<DedupScope>().unwrap(), DedupScope::Global);
        assert_eq!(
            "business".parse::<DedupScope>().unwrap(),
            DedupScope::Business
        );
        assert!("bogus".parse::<DedupScope>().is_err());
    }
}
