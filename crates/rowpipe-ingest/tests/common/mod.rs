//! Common test utilities for rowpipe-ingest integration tests
//!
//! In-memory stand-ins for the three external services the pipeline talks to:
//!
//! - [`MemoryObjectStore`]: objects keyed by bucket and key, with a download counter
//! - [`RecordingPublisher`]: records every publish and can fail chosen attempts
//! - [`MemorySchemaRegistry`]: idempotent registration with call counters
//!
//! [`TestHarness`] wires them into a ready [`IngestionPipeline`].

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use rowpipe_ingest::config::OperationMapping;
use rowpipe_ingest::operation::{
    builtin_record_types, EncodeContext, Organization, OperationRegistry, RecordType,
};
use rowpipe_ingest::pipeline::IngestionPipeline;
use rowpipe_ingest::publisher::RecordPublisher;
use rowpipe_ingest::reader::StreamingFileReader;
use rowpipe_ingest::schema::{SchemaCache, SchemaFormat, SchemaRegistry};
use rowpipe_ingest::storage::ObjectStore;
use rowpipe_ingest::{IngestError, Result};

pub const ORG_BUCKET: &str = "organization";
pub const ORG_TOPIC: &str = "organization-avro";
pub const ORG_KEY: &str = "organization";
pub const REGION: &str = "eu-west-1";

// ============================================================================
// Object storage
// ============================================================================

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    downloads: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn put(&self, bucket: &str, key: &str, body: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), body.as_bytes().to_vec());
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        dest: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64> {
        self.downloads.fetch_add(1, Ordering::SeqCst);

        let body = self
            .objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| IngestError::Acquire {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "NoSuchKey".to_string(),
            })?;

        dest.write_all(&body).await?;
        dest.flush().await?;
        Ok(body.len() as u64)
    }
}

// ============================================================================
// Publisher
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub key: String,
    pub value: Vec<u8>,
}

/// Records successful publishes; attempts listed in `fail_attempts` (1-based) fail.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Published>>,
    attempts: AtomicUsize,
    fail_attempts: HashSet<usize>,
}

impl RecordingPublisher {
    pub fn failing_on(attempts: &[usize]) -> Self {
        Self {
            fail_attempts: attempts.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, key: &str, value: &[u8]) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_attempts.contains(&attempt) {
            return Err(IngestError::Publish {
                topic: topic.to_string(),
                message: "Broker: Leader not available".to_string(),
            });
        }

        self.published.lock().unwrap().push(Published {
            topic: topic.to_string(),
            key: key.to_string(),
            value: value.to_vec(),
        });
        Ok(())
    }
}

// ============================================================================
// Schema registry
// ============================================================================

#[derive(Default)]
pub struct MemorySchemaRegistry {
    ids: Mutex<HashMap<(String, String), i32>>,
    bodies: Mutex<HashMap<i32, String>>,
    pub registrations: AtomicUsize,
    pub fetches: AtomicUsize,
}

#[async_trait]
impl SchemaRegistry for MemorySchemaRegistry {
    async fn register(&self, subject: &str, schema: &str, _format: SchemaFormat) -> Result<i32> {
        self.registrations.fetch_add(1, Ordering::SeqCst);

        let mut ids = self.ids.lock().unwrap();
        let next = ids.len() as i32 + 41;
        let id = *ids
            .entry((subject.to_string(), schema.to_string()))
            .or_insert(next);
        self.bodies.lock().unwrap().insert(id, schema.to_string());
        Ok(id)
    }

    async fn fetch(&self, id: i32) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| IngestError::SchemaNotFound {
                id,
                message: "Schema not found".to_string(),
            })
    }
}

// ============================================================================
// Record types
// ============================================================================

/// Organization rows, except rows whose uuid is `poison` fail to encode.
pub struct PoisonedOrganization {
    inner: Organization,
}

impl PoisonedOrganization {
    pub fn new() -> Self {
        Self {
            inner: Organization::new().unwrap(),
        }
    }
}

impl RecordType for PoisonedOrganization {
    fn name(&self) -> &'static str {
        "poisoned-organization"
    }

    fn schema_body(&self) -> &str {
        self.inner.schema_body()
    }

    fn expected_headers(&self) -> &[&'static str] {
        self.inner.expected_headers()
    }

    fn encode_payload(&self, row: &[String], ctx: &EncodeContext<'_>) -> Result<Vec<u8>> {
        if ctx.headers.cell(row, "uuid")? == "poison" {
            return Err(IngestError::Config("poisoned row".to_string()));
        }
        self.inner.encode_payload(row, ctx)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct TestHarness {
    pub store: Arc<MemoryObjectStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub schemas: Arc<MemorySchemaRegistry>,
    pub cache: SchemaCache,
    pub registry: Arc<OperationRegistry>,
    pub pipeline: IngestionPipeline,
    pub scratch: tempfile::TempDir,
}

impl TestHarness {
    /// `organization` bucket mapped to the organization record type.
    pub async fn new(publisher: RecordingPublisher) -> Self {
        Self::with_mappings(
            publisher,
            BTreeMap::from([(ORG_BUCKET.to_string(), mapping(ORG_TOPIC, None))]),
        )
        .await
    }

    pub async fn with_mappings(
        publisher: RecordingPublisher,
        mappings: BTreeMap<String, OperationMapping>,
    ) -> Self {
        let store = Arc::new(MemoryObjectStore::default());
        let publisher = Arc::new(publisher);
        let schemas = Arc::new(MemorySchemaRegistry::default());
        let cache = SchemaCache::new(schemas.clone());
        let scratch = tempfile::tempdir().unwrap();

        let mut record_types = builtin_record_types().unwrap();
        record_types.push(Arc::new(PoisonedOrganization::new()));

        let registry = Arc::new(
            OperationRegistry::build(&mappings, &record_types, &cache)
                .await
                .unwrap(),
        );
        let pipeline = IngestionPipeline::new(
            Arc::clone(&registry),
            StreamingFileReader::new(store.clone(), Some(scratch.path().to_path_buf())),
            publisher.clone(),
        );

        Self {
            store,
            publisher,
            schemas,
            cache,
            registry,
            pipeline,
            scratch,
        }
    }

    pub fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch.path()).unwrap().next().is_none()
    }
}

pub fn mapping(topic: &str, record_type: Option<&str>) -> OperationMapping {
    OperationMapping {
        topic: topic.to_string(),
        key: ORG_KEY.to_string(),
        record_type: record_type.map(str::to_string),
    }
}

/// `uuid,name,owner_user_uuid` file body with `rows` numbered organizations.
pub fn organization_csv(rows: usize) -> String {
    let mut body = String::from("uuid,name,owner_user_uuid\n");
    for i in 1..=rows {
        body.push_str(&format!("org-{i},Organization {i},owner-{i}\n"));
    }
    body
}
