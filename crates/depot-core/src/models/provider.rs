//! Storage-provider descriptors.
//!
//! Descriptors are configuration records owned by the surrounding platform;
//! Depot resolves them to concrete backends in `depot-storage`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Storage backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Local,
    S3,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(ProviderKind::Local),
            "s3" => Ok(ProviderKind::S3),
            _ => Err(anyhow::anyhow!("Invalid provider kind: {}", s)),
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProviderKind::Local => write!(f, "local"),
            ProviderKind::S3 => write!(f, "s3"),
        }
    }
}

/// One configured storage backend. `config` is a backend-specific blob
/// (see `LocalProviderConfig` / `S3ProviderConfig`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageProviderDescriptor {
    pub id: Uuid,
    pub name: String,
    pub kind: ProviderKind,
    pub config: serde_json::Value,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Lowest priority wins when no explicit provider is requested.
    #[serde(default)]
    pub priority: i32,
}

fn default_enabled() -> bool {
    true
}

/// Configuration blob for the local filesystem backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalProviderConfig {
    pub base_path: String,
    pub base_url: String,
}

/// Configuration blob for an S3-compatible backend. Credentials come from the
/// environment (AWS_* variables), not the descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3ProviderConfig {
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_deserialization_defaults() {
        let json = r#"{
            "id": "4be029f4-9e4b-44b0-9a0e-9ce1d1c1b0aa",
            "name": "primary",
            "kind": "local",
            "config": {"base_path": "/var/lib/depot", "base_url": "http://localhost:3000/files"}
        }"#;
        let descriptor: StorageProviderDescriptor = serde_json::from_str(json).unwrap();
        assert!(descriptor.enabled);
        assert_eq!(descriptor.priority, 0);
        assert_eq!(descriptor.kind, ProviderKind::Local);

        let config: LocalProviderConfig = serde_json::from_value(descriptor.config).unwrap();
        assert_eq!(config.base_path, "/var/lib/depot");
    }
}
