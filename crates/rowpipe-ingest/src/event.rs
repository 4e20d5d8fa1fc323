//! Trigger events and per-event lineage
//!
//! The trigger delivers object-created notifications in the S3 event
//! notification shape; only the fields the pipeline needs are decoded.

use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;

/// Origin tag stamped on every record produced from a storage event.
pub const ORIGIN_S3: &str = "s3";

/// One "object created" notification; one per file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub bucket: String,
    pub key: String,
    pub region: String,
}

impl TriggerEvent {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            region: region.into(),
        }
    }

    /// Format hint derived from the object key's extension.
    pub fn content_type(&self) -> &str {
        content_type_for_key(&self.key)
    }
}

/// Extension of `key` (`exports/orgs.csv` -> `csv`).
///
/// A key without a usable extension is returned whole, which selects the
/// default row format downstream.
pub fn content_type_for_key(key: &str) -> &str {
    match key.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.chars().all(|c| c.is_alphanumeric() || c == '_') =>
        {
            ext
        },
        _ => key,
    }
}

/// Lineage values shared by every row of one triggering file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingContext {
    pub tracking_id: String,
    pub origin: String,
    pub region: String,
}

impl TrackingContext {
    /// Fresh context with a new random tracking id.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            tracking_id: Uuid::new_v4().to_string(),
            origin: ORIGIN_S3.to_string(),
            region: region.into(),
        }
    }
}

#[derive(Deserialize)]
struct Notification {
    #[serde(rename = "Records", default)]
    records: Vec<NotificationRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationRecord {
    #[serde(default)]
    aws_region: String,
    s3: S3Entity,
}

#[derive(Deserialize)]
struct S3Entity {
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Deserialize)]
struct BucketEntity {
    name: String,
}

#[derive(Deserialize)]
struct ObjectEntity {
    key: String,
}

/// Decode a notification batch into trigger events, in delivery order.
pub fn parse_notification(json: &str) -> Result<Vec<TriggerEvent>> {
    let notification: Notification = serde_json::from_str(json)?;

    Ok(notification
        .records
        .into_iter()
        .map(|r| TriggerEvent::new(r.s3.bucket.name, r.s3.object.key, r.aws_region))
        .collect())
}
