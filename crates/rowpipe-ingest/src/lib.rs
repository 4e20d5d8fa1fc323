//! Rowpipe Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Turns delimited text files landing in object storage into Avro records on
//! Kafka topics, one record per data row.
//!
//! # Components
//!
//! - **Header resolution** ([`header`]): expected field names to column positions
//! - **Schema cache** ([`schema`]): registry-backed schema ids and bodies
//! - **Operations** ([`operation`]): source identifier to topic, schema and row encoder
//! - **Streaming reader** ([`reader`]): download, then rows through a bounded hand-off
//! - **Pipeline** ([`pipeline`]): per-file state machine with per-row failure isolation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rowpipe_ingest::config::IngestConfig;
//! use rowpipe_ingest::event::TriggerEvent;
//! use rowpipe_ingest::operation::{builtin_record_types, OperationRegistry};
//! use rowpipe_ingest::pipeline::IngestionPipeline;
//! use rowpipe_ingest::publisher::KafkaPublisher;
//! use rowpipe_ingest::reader::StreamingFileReader;
//! use rowpipe_ingest::schema::{HttpSchemaRegistry, SchemaCache};
//! use rowpipe_ingest::storage::S3ObjectStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::load()?;
//!     let registry = HttpSchemaRegistry::new(&config.schema_registry.url, config.schema_registry.timeout())?;
//!     let cache = SchemaCache::new(Arc::new(registry));
//!     let operations =
//!         OperationRegistry::build(&config.operations, &builtin_record_types()?, &cache).await?;
//!
//!     let store = S3ObjectStore::new(&config.storage).await?;
//!     let pipeline = IngestionPipeline::new(
//!         Arc::new(operations),
//!         StreamingFileReader::new(Arc::new(store), config.scratch_dir.clone()),
//!         Arc::new(KafkaPublisher::new(&config.kafka)?),
//!     );
//!
//!     let events = [TriggerEvent::new("organization", "orgs.csv", "eu-west-1")];
//!     let summary = pipeline.process_batch(&events).await;
//!     println!("published {}", summary.published());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod header;
pub mod operation;
pub mod pipeline;
pub mod publisher;
pub mod reader;
pub mod schema;
pub mod storage;
pub mod wire;

pub use error::{IngestError, Result};
