//! Ingestion pipeline
//!
//! Per triggering file:
//!
//! ```text
//! lookup operation ──► acquire file ──► resolve headers ──► stream rows ──► done
//!        │                  │                  │
//!        └─ skipped         └─ skipped         └─ skipped
//! ```
//!
//! Skips happen before a single row is encoded. Once rows flow, every row is
//! encoded and published before the next one is requested, so publishes follow
//! file order. A row that fails to encode or publish is logged and dropped;
//! nothing is retried.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::error::IngestError;
use crate::event::{TrackingContext, TriggerEvent};
use crate::header;
use crate::operation::OperationRegistry;
use crate::publisher::RecordPublisher;
use crate::reader::StreamingFileReader;

/// Why a file was not streamed.
#[derive(Debug)]
pub enum SkipReason {
    UnknownSource,
    Acquire(IngestError),
    Headers(IngestError),
}

/// Row counters for one streamed file.
///
/// `published + publish_failures + encode_failures == rows_received`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    /// Data rows received, header excluded
    pub rows_received: u64,
    pub encode_failures: u64,
    pub published: u64,
    pub publish_failures: u64,
    /// Lines the reader could not parse; never received
    pub parse_errors: u64,
}

impl FileStats {
    pub fn dropped(&self) -> u64 {
        self.encode_failures + self.publish_failures + self.parse_errors
    }
}

#[derive(Debug)]
pub enum FileOutcome {
    Skipped(SkipReason),
    Completed(FileStats),
}

impl FileOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, FileOutcome::Skipped(_))
    }

    pub fn stats(&self) -> Option<&FileStats> {
        match self {
            FileOutcome::Completed(stats) => Some(stats),
            FileOutcome::Skipped(_) => None,
        }
    }
}

/// Outcomes of one trigger batch, in event order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub files: Vec<(TriggerEvent, FileOutcome)>,
}

impl BatchSummary {
    pub fn completed(&self) -> usize {
        self.files.iter().filter(|(_, o)| !o.is_skipped()).count()
    }

    pub fn skipped(&self) -> usize {
        self.files.iter().filter(|(_, o)| o.is_skipped()).count()
    }

    pub fn published(&self) -> u64 {
        self.files
            .iter()
            .filter_map(|(_, o)| o.stats())
            .map(|s| s.published)
            .sum()
    }

    pub fn dropped(&self) -> u64 {
        self.files
            .iter()
            .filter_map(|(_, o)| o.stats())
            .map(FileStats::dropped)
            .sum()
    }
}

pub struct IngestionPipeline {
    registry: Arc<OperationRegistry>,
    reader: StreamingFileReader,
    publisher: Arc<dyn RecordPublisher>,
}

impl IngestionPipeline {
    pub fn new(
        registry: Arc<OperationRegistry>,
        reader: StreamingFileReader,
        publisher: Arc<dyn RecordPublisher>,
    ) -> Self {
        Self {
            registry,
            reader,
            publisher,
        }
    }

    /// Process every event in order. A failing file never stops the batch.
    pub async fn process_batch(&self, events: &[TriggerEvent]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for event in events {
            let outcome = self.process_event(event).await;
            summary.files.push((event.clone(), outcome));
        }

        if let Err(e) = self.publisher.flush().await {
            warn!(error = %e, "Flushing publisher failed");
        }

        info!(
            files = summary.files.len(),
            completed = summary.completed(),
            skipped = summary.skipped(),
            published = summary.published(),
            dropped = summary.dropped(),
            "Batch processed"
        );

        summary
    }

    #[instrument(skip(self), fields(bucket = %event.bucket, key = %event.key))]
    pub async fn process_event(&self, event: &TriggerEvent) -> FileOutcome {
        let Some(operation) = self.registry.lookup(&event.bucket) else {
            error!("No operation configured for source {}, skipping {}", event.bucket, event.key);
            return FileOutcome::Skipped(SkipReason::UnknownSource);
        };

        let mut rows = match self
            .reader
            .acquire(&event.bucket, &event.key, event.content_type())
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "Failed to acquire {}", event.key);
                return FileOutcome::Skipped(SkipReason::Acquire(e));
            },
        };

        let header_row = rows.next_row().await.unwrap_or_default();
        let headers = match header::resolve(operation.expected_headers(), &header_row) {
            Ok(headers) => headers,
            Err(e) => {
                error!(error = %e, "Rejecting {}", event.key);
                rows.finish().await;
                return FileOutcome::Skipped(SkipReason::Headers(e));
            },
        };

        let tracking = TrackingContext::new(&event.region);
        debug!(tracking_id = %tracking.tracking_id, topic = operation.topic(), "Streaming rows");

        let mut stats = FileStats::default();
        while let Some(row) = rows.next_row().await {
            stats.rows_received += 1;
            let line = stats.rows_received;

            let record = match operation.encode_row(&row, &headers, &tracking) {
                Ok(record) => record,
                Err(e) => {
                    stats.encode_failures += 1;
                    warn!(row = line, error = %e, "Failed to encode row, dropped");
                    continue;
                },
            };

            match self
                .publisher
                .publish(operation.topic(), operation.key(), &record)
                .await
            {
                Ok(()) => stats.published += 1,
                Err(e) => {
                    stats.publish_failures += 1;
                    warn!(row = line, error = %e, "Failed to publish row, dropped");
                },
            }
        }

        stats.parse_errors = rows.finish().await.parse_errors;

        info!(
            tracking_id = %tracking.tracking_id,
            topic = operation.topic(),
            rows = stats.rows_received,
            published = stats.published,
            dropped = stats.dropped(),
            "File processed"
        );

        FileOutcome::Completed(stats)
    }
}
