//! Streaming file reader
//!
//! Acquisition happens in two phases:
//!
//! 1. the whole object is downloaded into a scratch file; any failure here
//!    fails the acquisition and no row is ever emitted
//! 2. a blocking producer task parses the scratch file and hands rows one at
//!    a time to the consumer through a capacity-1 channel
//!
//! The producer owns the scratch file, so it is deleted as soon as parsing
//! stops, whatever the reason. The first row handed off is the header row;
//! the reader does not treat it specially.
//!
//! A [`RowStream`] is single-pass. Re-reading a file means acquiring it again.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{IngestError, Result};
use crate::storage::ObjectStore;

/// One parsed line: cells in column order.
pub type Row = Vec<String>;

/// Rows in flight between producer and consumer.
const HANDOFF_CAPACITY: usize = 1;

/// Pull parser over a local file
pub trait RowSource: Send {
    /// Next row, a per-row parse error, or `None` at end of input.
    fn next_row(&mut self) -> Option<Result<Row>>;

    /// Whether parsing can continue after `err`.
    fn is_recoverable(&self, err: &IngestError) -> bool {
        matches!(err, IngestError::RowParse { .. })
    }
}

/// Row formats, selected by content type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFormat {
    DelimitedText { delimiter: u8 },
}

impl RowFormat {
    /// Format for a content type hint; comma-delimited text unless told otherwise.
    pub fn for_content_type(content_type: &str) -> Self {
        match content_type.to_ascii_lowercase().as_str() {
            "tsv" | "tab" | "text/tab-separated-values" => {
                RowFormat::DelimitedText { delimiter: b'\t' }
            },
            _ => RowFormat::DelimitedText { delimiter: b',' },
        }
    }

    pub fn open(self, file: File) -> Box<dyn RowSource> {
        match self {
            RowFormat::DelimitedText { delimiter } => Box::new(DelimitedSource::new(file, delimiter)),
        }
    }
}

/// RFC 4180 style delimited text.
///
/// Every row must have as many fields as the first one; a row that does not
/// is reported as a parse error and skipped.
pub struct DelimitedSource {
    records: csv::StringRecordsIntoIter<File>,
}

impl DelimitedSource {
    pub fn new(file: File, delimiter: u8) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .flexible(false)
            .from_reader(file);
        Self {
            records: reader.into_records(),
        }
    }
}

impl RowSource for DelimitedSource {
    fn next_row(&mut self) -> Option<Result<Row>> {
        let record = self.records.next()?;
        Some(match record {
            Ok(record) => Ok(record.iter().map(str::to_string).collect()),
            Err(err) if err.is_io_error() => Err(IngestError::Io(std::io::Error::other(err))),
            Err(err) => Err(IngestError::RowParse {
                line: err.position().map(|p| p.line()).unwrap_or(0),
                message: err.to_string(),
            }),
        })
    }
}

/// Producer-side counters for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub bytes: u64,
    pub rows: u64,
    pub parse_errors: u64,
}

/// Consumer end of an acquisition.
pub struct RowStream {
    rows: mpsc::Receiver<Row>,
    producer: JoinHandle<ReadStats>,
}

impl RowStream {
    /// Next row; `None` once the producer has finished.
    pub async fn next_row(&mut self) -> Option<Row> {
        self.rows.recv().await
    }

    /// Stop consuming and wait for the producer to release its scratch file.
    pub async fn finish(self) -> ReadStats {
        let RowStream { rows, producer } = self;
        drop(rows);

        match producer.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Row producer task failed");
                ReadStats::default()
            },
        }
    }
}

/// Downloads objects to scratch storage and streams their rows.
#[derive(Clone)]
pub struct StreamingFileReader {
    store: Arc<dyn ObjectStore>,
    scratch_dir: Option<PathBuf>,
}

impl StreamingFileReader {
    pub fn new(store: Arc<dyn ObjectStore>, scratch_dir: Option<PathBuf>) -> Self {
        Self { store, scratch_dir }
    }

    /// Fetch `bucket`/`key` fully, then start streaming its rows.
    #[instrument(skip(self))]
    pub async fn acquire(&self, bucket: &str, key: &str, content_type: &str) -> Result<RowStream> {
        let scratch_failed = |e: std::io::Error| IngestError::Acquire {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: format!("scratch file: {e}"),
        };

        let dir = self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir);
        let scratch = tempfile::Builder::new()
            .prefix("rowpipe-")
            .suffix(".part")
            .tempfile_in(&dir)
            .map_err(scratch_failed)?;

        let mut sink = tokio::fs::File::from_std(scratch.reopen().map_err(scratch_failed)?);
        let bytes = self.store.download(bucket, key, &mut sink).await?;
        drop(sink);
        info!("Downloaded {} {} bytes", key, bytes);

        let file = scratch.reopen().map_err(scratch_failed)?;
        let format = RowFormat::for_content_type(content_type);
        debug!(?format, content_type, "Row format selected");

        let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
        let key = key.to_string();
        let producer = tokio::task::spawn_blocking(move || {
            // Dropped (and deleted) when this closure returns or unwinds.
            let _scratch = scratch;
            let mut stats = produce(format.open(file), &tx, &key);
            stats.bytes = bytes;
            stats
        });

        Ok(RowStream { rows: rx, producer })
    }
}

fn produce(mut source: Box<dyn RowSource>, tx: &mpsc::Sender<Row>, key: &str) -> ReadStats {
    let mut stats = ReadStats::default();

    while let Some(next) = source.next_row() {
        match next {
            Ok(row) => {
                if tx.blocking_send(row).is_err() {
                    debug!(key, "Row consumer went away, stopping producer");
                    break;
                }
                stats.rows += 1;
            },
            Err(err) if source.is_recoverable(&err) => {
                stats.parse_errors += 1;
                warn!(key, error = %err, "Error reading from file, row skipped");
            },
            Err(err) => {
                stats.parse_errors += 1;
                error!(key, error = %err, "Error reading from file, stopping");
                break;
            },
        }
    }

    stats
}
