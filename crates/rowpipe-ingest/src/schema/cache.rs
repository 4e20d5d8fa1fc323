//! Process-lifetime schema cache
//!
//! Two paths share one cache object:
//!
//! - registration (`get_or_create_schema_id`), used once per operation at
//!   startup; a failure here is fatal to the caller
//! - lookup (`get_schema`), a read-through id -> body cache; the first lookup
//!   of an id hits the registry, later ones never do
//!
//! Entries are append-only. Concurrent lookups of the same uncached id share
//! one fetch: each id owns a `OnceCell`, and only the cell's initializer talks
//! to the registry. A failed fetch leaves the cell empty so a later lookup can
//! retry.

use std::collections::HashMap;
use std::sync::Arc;

use apache_avro::{from_avro_datum, Schema};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use super::registry::{SchemaFormat, SchemaRegistry};
use crate::error::Result;
use crate::wire;

type Slot = Arc<OnceCell<Arc<str>>>;

pub struct SchemaCache {
    registry: Arc<dyn SchemaRegistry>,
    bodies: Mutex<HashMap<i32, Slot>>,
}

impl SchemaCache {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            registry,
            bodies: Mutex::new(HashMap::new()),
        }
    }

    /// Register `schema` under `subject` and return its id.
    ///
    /// The registered body also seeds the id -> body cache.
    pub async fn get_or_create_schema_id(&self, subject: &str, schema: &str) -> Result<i32> {
        let id = self
            .registry
            .register(subject, schema, SchemaFormat::Avro)
            .await?;

        let slot = self.slot(id).await;
        // An existing body for this id wins; the registry returned the id for it.
        let _ = slot.set(Arc::from(schema));

        info!(subject, schema_id = id, "Schema id resolved");
        Ok(id)
    }

    /// Schema body for `id`, fetched from the registry on first use.
    pub async fn get_schema(&self, id: i32) -> Result<Arc<str>> {
        let slot = self.slot(id).await;

        let body = slot
            .get_or_try_init(|| async {
                debug!(schema_id = id, "Schema cache miss");
                let body = self.registry.fetch(id).await?;
                Ok::<_, crate::error::IngestError>(Arc::from(body))
            })
            .await?;

        Ok(Arc::clone(body))
    }

    /// Decode a framed wire record with the schema its header names.
    pub async fn decode(&self, record: &[u8]) -> Result<apache_avro::types::Value> {
        let (id, mut payload) = wire::parse(record)?;
        let body = self.get_schema(id).await?;
        let schema = Schema::parse_str(&body)?;

        Ok(from_avro_datum(&schema, &mut payload, None)?)
    }

    /// Number of ids with a cached body.
    pub async fn cached_len(&self) -> usize {
        self.bodies
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    async fn slot(&self, id: i32) -> Slot {
        let mut bodies = self.bodies.lock().await;
        Arc::clone(bodies.entry(id).or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct SlowRegistry {
        fetches: AtomicUsize,
        registrations: AtomicUsize,
    }

    #[async_trait]
    impl SchemaRegistry for SlowRegistry {
        async fn register(&self, _subject: &str, _schema: &str, _: SchemaFormat) -> Result<i32> {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            Ok(9)
        }

        async fn fetch(&self, id: i32) -> Result<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if id == 404 {
                return Err(IngestError::SchemaNotFound {
                    id,
                    message: "gone".to_string(),
                });
            }
            Ok(format!("schema-{id}"))
        }
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let registry = Arc::new(SlowRegistry::default());
        let cache = SchemaCache::new(registry.clone());

        assert_eq!(&*cache.get_schema(1).await.unwrap(), "schema-1");
        assert_eq!(&*cache.get_schema(1).await.unwrap(), "schema-1");
        assert_eq!(registry.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached_len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let registry = Arc::new(SlowRegistry::default());
        let cache = SchemaCache::new(registry.clone());

        let lookups = (0..8).map(|_| cache.get_schema(5));
        for body in futures::future::join_all(lookups).await {
            assert_eq!(&*body.unwrap(), "schema-5");
        }

        assert_eq!(registry.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let registry = Arc::new(SlowRegistry::default());
        let cache = SchemaCache::new(registry.clone());

        assert!(cache.get_schema(404).await.is_err());
        assert!(cache.get_schema(404).await.is_err());
        assert_eq!(registry.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(cache.cached_len().await, 0);
    }

    #[tokio::test]
    async fn test_decode_uses_schema_named_in_header() {
        let registry = Arc::new(SlowRegistry::default());
        let cache = SchemaCache::new(registry.clone());
        let schema = r#"{"type": "record", "name": "Pair", "fields": [
            {"name": "left", "type": "string"}, {"name": "right", "type": "long"}]}"#;
        let id = cache.get_or_create_schema_id("pairs", schema).await.unwrap();

        let parsed = Schema::parse_str(schema).unwrap();
        let value = apache_avro::types::Value::Record(vec![
            ("left".to_string(), apache_avro::types::Value::String("a".to_string())),
            ("right".to_string(), apache_avro::types::Value::Long(7)),
        ]);
        let payload = apache_avro::to_avro_datum(&parsed, value.clone()).unwrap();

        assert_eq!(cache.decode(&wire::frame(id, &payload)).await.unwrap(), value);
        assert!(cache.decode(&[1, 0, 0, 0, 9]).await.is_err());
    }

    #[tokio::test]
    async fn test_registration_seeds_body_cache() {
        let registry = Arc::new(SlowRegistry::default());
        let cache = SchemaCache::new(registry.clone());

        let id = cache.get_or_create_schema_id("organization-avro", "{}").await.unwrap();
        assert_eq!(id, 9);
        assert_eq!(&*cache.get_schema(9).await.unwrap(), "{}");
        assert_eq!(registry.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(registry.registrations.load(Ordering::SeqCst), 1);
    }
}
