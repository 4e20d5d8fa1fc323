//! Error types for rowpipe-ingest
//!
//! Variants are grouped by when they can happen: at startup (fatal), before a
//! file's rows are streamed (the file is skipped), or while a single row is
//! handled (the row is dropped).

use thiserror::Error;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    // ---- startup -----------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Env(#[from] rowpipe_common::CommonError),

    #[error("Schema registration failed for subject {subject}: {message}")]
    SchemaRegistration { subject: String, message: String },

    #[error("Invalid Avro schema for {record_type}: {source}")]
    InvalidSchema {
        record_type: String,
        #[source]
        source: apache_avro::Error,
    },

    // ---- per file ----------------------------------------------------------
    #[error("Failed to fetch s3://{bucket}/{key}: {message}")]
    Acquire {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Missing header(s) {missing:?} in headers: {observed:?}")]
    MissingHeaders {
        missing: Vec<String>,
        observed: Vec<String>,
    },

    // ---- per row / per lookup ----------------------------------------------
    #[error("Schema {id} not found: {message}")]
    SchemaNotFound { id: i32, message: String },

    #[error("Row has {len} column(s), {field} expected at column {index}")]
    ShortRow {
        field: String,
        index: usize,
        len: usize,
    },

    #[error("Unreadable row at line {line}: {message}")]
    RowParse { line: u64, message: String },

    #[error("Avro encoding failed: {0}")]
    Avro(#[from] apache_avro::Error),

    #[error("Malformed wire record: {0}")]
    WireFormat(String),

    #[error("Publish to {topic} failed: {message}")]
    Publish { topic: String, message: String },

    // ---- plumbing ----------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Event decode error: {0}")]
    Event(#[from] serde_json::Error),
}
