//! Operation registry
//!
//! An [`Operation`] binds one source identifier (the bucket a file lands in)
//! to a target topic, a registered schema id and a [`RecordType`] that turns
//! rows into schema-encoded payloads. The registry is built once at startup
//! and read concurrently afterwards without locking.
//!
//! Adding a source type means implementing [`RecordType`] and listing it in
//! [`builtin_record_types`]; neither the pipeline nor the file reader change.

pub mod organization;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::OperationMapping;
use crate::error::{IngestError, Result};
use crate::event::TrackingContext;
use crate::header::HeaderIndex;
use crate::schema::SchemaCache;
use crate::wire;

pub use organization::Organization;

/// Everything a record type may need to encode one row.
pub struct EncodeContext<'a> {
    pub headers: &'a HeaderIndex,
    pub tracking: &'a TrackingContext,
    pub schema_id: i32,
}

/// A row transform for one source type
pub trait RecordType: Send + Sync {
    /// Registry name, matched case-insensitively against configuration.
    fn name(&self) -> &'static str;

    /// Schema body registered for the type's topic.
    fn schema_body(&self) -> &str;

    /// Header names every file of this type must carry.
    fn expected_headers(&self) -> &[&'static str];

    /// Encode one data row as a schema-encoded payload (without wire framing).
    fn encode_payload(&self, row: &[String], ctx: &EncodeContext<'_>) -> Result<Vec<u8>>;
}

/// Record types compiled into this binary.
pub fn builtin_record_types() -> Result<Vec<Arc<dyn RecordType>>> {
    Ok(vec![Arc::new(Organization::new()?)])
}

/// Immutable per-source descriptor
pub struct Operation {
    topic: String,
    key: String,
    schema_id: i32,
    record_type: Arc<dyn RecordType>,
}

impl Operation {
    pub fn new(
        topic: impl Into<String>,
        key: impl Into<String>,
        schema_id: i32,
        record_type: Arc<dyn RecordType>,
    ) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            schema_id,
            record_type,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Partition key; empty means "no key".
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn schema_id(&self) -> i32 {
        self.schema_id
    }

    pub fn record_type(&self) -> &str {
        self.record_type.name()
    }

    pub fn expected_headers(&self) -> &[&'static str] {
        self.record_type.expected_headers()
    }

    /// Encode `row` into a framed wire record ready to publish.
    pub fn encode_row(
        &self,
        row: &[String],
        headers: &HeaderIndex,
        tracking: &TrackingContext,
    ) -> Result<Vec<u8>> {
        let ctx = EncodeContext {
            headers,
            tracking,
            schema_id: self.schema_id,
        };
        let payload = self.record_type.encode_payload(row, &ctx)?;
        Ok(wire::frame(self.schema_id, &payload))
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("topic", &self.topic)
            .field("key", &self.key)
            .field("schema_id", &self.schema_id)
            .field("record_type", &self.record_type.name())
            .finish()
    }
}

/// Source identifier -> operation lookup
#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Arc<Operation>>,
}

impl OperationRegistry {
    /// Build the registry from configured mappings.
    ///
    /// Every mapping's schema is registered through `cache`; any registration
    /// failure aborts the build, since the operation could never publish.
    #[instrument(skip_all, fields(mappings = mappings.len()))]
    pub async fn build(
        mappings: &BTreeMap<String, OperationMapping>,
        record_types: &[Arc<dyn RecordType>],
        cache: &SchemaCache,
    ) -> Result<Self> {
        let mut registry = Self::default();

        for (source, mapping) in mappings {
            let type_name = mapping.record_type.as_deref().unwrap_or(source);
            let record_type = record_types
                .iter()
                .find(|rt| rt.name().eq_ignore_ascii_case(type_name))
                .ok_or_else(|| {
                    IngestError::Config(format!(
                        "operation {source:?} names unknown record type {type_name:?}"
                    ))
                })?;

            let schema_id = cache
                .get_or_create_schema_id(&mapping.topic, record_type.schema_body())
                .await?;

            info!(
                source = %source,
                topic = %mapping.topic,
                record_type = record_type.name(),
                schema_id,
                "Operation registered"
            );

            registry.insert(
                source,
                Operation::new(&mapping.topic, &mapping.key, schema_id, Arc::clone(record_type)),
            );
        }

        Ok(registry)
    }

    /// Add or replace the operation for `source`.
    pub fn insert(&mut self, source: &str, operation: Operation) {
        self.operations
            .insert(source.to_lowercase(), Arc::new(operation));
    }

    /// Case-insensitive lookup by source identifier.
    pub fn lookup(&self, source: &str) -> Option<Arc<Operation>> {
        self.operations.get(&source.to_lowercase()).cloned()
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
