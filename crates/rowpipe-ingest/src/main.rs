//! Rowpipe Ingest - object-created notifications to Kafka records

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rowpipe_common::logging::{init_logging, LogConfig, LogLevel};
use rowpipe_ingest::config::IngestConfig;
use rowpipe_ingest::event::parse_notification;
use rowpipe_ingest::operation::{builtin_record_types, OperationRegistry};
use rowpipe_ingest::pipeline::IngestionPipeline;
use rowpipe_ingest::publisher::KafkaPublisher;
use rowpipe_ingest::reader::StreamingFileReader;
use rowpipe_ingest::schema::{HttpSchemaRegistry, SchemaCache};
use rowpipe_ingest::storage::S3ObjectStore;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "rowpipe-ingest")]
#[command(author, version, about = "Publish rows of newly created files to Kafka")]
struct Cli {
    /// Object-created notification batch (JSON); read from stdin when omitted
    #[arg(short, long)]
    event: Option<PathBuf>,

    /// Invocation deadline in seconds; DEADLINE_GRACE_SECS is added on top
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn read_notification(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file {}", path.display())),
        None => {
            let mut json = String::new();
            std::io::stdin()
                .read_to_string(&mut json)
                .context("Failed to read event from stdin")?;
            Ok(json)
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("rowpipe-ingest")
        .build()
        .merge_env()
        .context("Invalid logging configuration")?;

    let _log_guard = init_logging(&log_config)?;

    let config = IngestConfig::load().context("Failed to load configuration")?;

    let registry = HttpSchemaRegistry::new(&config.schema_registry.url, config.schema_registry.timeout())
        .context("Failed to create schema registry client")?;
    let cache = SchemaCache::new(Arc::new(registry));

    let record_types = builtin_record_types().context("Failed to load record types")?;
    let operations = OperationRegistry::build(&config.operations, &record_types, &cache)
        .await
        .context("Failed to register operations")?;
    info!(operations = operations.len(), "Operation registry ready");

    let store = S3ObjectStore::new(&config.storage)
        .await
        .context("Failed to create storage client")?;
    let publisher = KafkaPublisher::new(&config.kafka).context("Failed to create Kafka producer")?;

    let pipeline = IngestionPipeline::new(
        Arc::new(operations),
        StreamingFileReader::new(Arc::new(store), config.scratch_dir.clone()),
        Arc::new(publisher),
    );

    let events = parse_notification(&read_notification(cli.event.as_ref())?)
        .context("Failed to decode event notification")?;
    info!(files = events.len(), "Processing trigger batch");

    let summary = match cli.deadline_secs {
        Some(secs) => {
            let budget = Duration::from_secs(secs) + config.deadline_grace();
            match tokio::time::timeout(budget, pipeline.process_batch(&events)).await {
                Ok(summary) => summary,
                Err(_) => {
                    error!(?budget, "Deadline exceeded, abandoning batch");
                    bail!("deadline of {}s (plus grace) exceeded", secs);
                },
            }
        },
        None => pipeline.process_batch(&events).await,
    };

    info!(
        completed = summary.completed(),
        skipped = summary.skipped(),
        published = summary.published(),
        "Ingestion complete"
    );
    Ok(())
}
