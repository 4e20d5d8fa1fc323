//! Configuration management
//!
//! Everything is supplied through the environment (optionally seeded from a
//! `.env` file) and resolved once at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use rowpipe_common::env;

use crate::error::{IngestError, Result};

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";

pub const DEFAULT_KAFKA_MESSAGE_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_SCHEMA_REGISTRY_URL: &str = "http://localhost:8081";

pub const DEFAULT_STORAGE_REGION: &str = "eu-west-1";

/// Extra time granted past the invocation deadline for in-flight work.
pub const DEFAULT_DEADLINE_GRACE_SECS: u64 = 300;

/// One entry of the `OPERATIONS` table, keyed by source identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationMapping {
    /// Topic the rows are published to
    pub topic: String,
    /// Partition key for every record; empty publishes without a key
    #[serde(default)]
    pub key: String,
    /// Record type name; defaults to the source identifier
    #[serde(default)]
    pub record_type: Option<String>,
}

/// Parse the `OPERATIONS` JSON table.
pub fn parse_operations(json: &str) -> Result<BTreeMap<String, OperationMapping>> {
    serde_json::from_str(json)
        .map_err(|e| IngestError::Config(format!("OPERATIONS is not a valid mapping table: {e}")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Comma-separated bootstrap servers
    pub brokers: String,
    pub message_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRegistryConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl SchemaRegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Endpoint override for S3-compatible stores
    pub endpoint: Option<String>,
    pub region: String,
    /// Static credentials; the default provider chain is used when absent
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "****"))
            .field("path_style", &self.path_style)
            .finish()
    }
}

/// Ingest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub operations: BTreeMap<String, OperationMapping>,
    pub kafka: KafkaConfig,
    pub schema_registry: SchemaRegistryConfig,
    pub storage: StorageConfig,
    /// Directory for transient downloads; the system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
    pub deadline_grace_secs: u64,
}

impl IngestConfig {
    /// Load configuration from `.env` and the environment
    ///
    /// - `OPERATIONS` (required): `{"<source>": {"topic": "...", "key": "...", "record_type": "..."}}`
    /// - `KAFKA_BROKER`, `KAFKA_MESSAGE_TIMEOUT_MS`
    /// - `SCHEMA_CLIENT_ENDPOINT`, `SCHEMA_REGISTRY_TIMEOUT_SECS`
    /// - `AWS_ENDPOINT`, `AWS_DEFAULT_REGION`, `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`
    /// - `SCRATCH_DIR`, `DEADLINE_GRACE_SECS`
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let endpoint = env::var_opt("AWS_ENDPOINT");
        let config = IngestConfig {
            operations: parse_operations(&env::required("OPERATIONS")?)?,
            kafka: KafkaConfig {
                brokers: env::var_or("KAFKA_BROKER", DEFAULT_KAFKA_BROKER),
                message_timeout_ms: env::parse_or(
                    "KAFKA_MESSAGE_TIMEOUT_MS",
                    DEFAULT_KAFKA_MESSAGE_TIMEOUT_MS,
                )?,
            },
            schema_registry: SchemaRegistryConfig {
                url: env::var_or("SCHEMA_CLIENT_ENDPOINT", DEFAULT_SCHEMA_REGISTRY_URL),
                timeout_secs: env::parse_or(
                    "SCHEMA_REGISTRY_TIMEOUT_SECS",
                    crate::schema::registry::DEFAULT_TIMEOUT_SECS,
                )?,
            },
            storage: StorageConfig {
                path_style: env::parse_or("S3_PATH_STYLE", endpoint.is_some())?,
                endpoint,
                region: env::var_or("AWS_DEFAULT_REGION", DEFAULT_STORAGE_REGION),
                access_key: env::var_opt("AWS_ACCESS_KEY_ID"),
                secret_key: env::var_opt("AWS_SECRET_ACCESS_KEY"),
            },
            scratch_dir: env::var_opt("SCRATCH_DIR").map(PathBuf::from),
            deadline_grace_secs: env::parse_or("DEADLINE_GRACE_SECS", DEFAULT_DEADLINE_GRACE_SECS)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.operations.is_empty() {
            return Err(IngestError::Config("OPERATIONS defines no operations".to_string()));
        }

        for (source, mapping) in &self.operations {
            if source.trim().is_empty() {
                return Err(IngestError::Config("OPERATIONS has an empty source identifier".into()));
            }
            if mapping.topic.trim().is_empty() {
                return Err(IngestError::Config(format!("operation {source:?} has an empty topic")));
            }
        }

        let lowered: std::collections::BTreeSet<String> =
            self.operations.keys().map(|s| s.to_lowercase()).collect();
        if lowered.len() != self.operations.len() {
            return Err(IngestError::Config(
                "OPERATIONS has source identifiers that differ only by case".to_string(),
            ));
        }

        if self.kafka.brokers.trim().is_empty() {
            return Err(IngestError::Config("KAFKA_BROKER cannot be empty".to_string()));
        }

        if self.schema_registry.url.trim().is_empty() {
            return Err(IngestError::Config("SCHEMA_CLIENT_ENDPOINT cannot be empty".to_string()));
        }

        if self.storage.access_key.is_some() != self.storage.secret_key.is_some() {
            return Err(IngestError::Config(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together".to_string(),
            ));
        }

        if let Some(dir) = &self.scratch_dir {
            if !dir.is_dir() {
                return Err(IngestError::Config(format!(
                    "SCRATCH_DIR {} is not a directory",
                    dir.display()
                )));
            }
        }

        Ok(())
    }

    pub fn deadline_grace(&self) -> Duration {
        Duration::from_secs(self.deadline_grace_secs)
    }
}
