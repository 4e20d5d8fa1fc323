//! Object storage access
//!
//! The pipeline only ever reads whole objects, so the seam is a single
//! download-into-writer capability. [`S3ObjectStore`] implements it against
//! S3 or any S3-compatible endpoint (MinIO, LocalStack).

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{config::Region, error::DisplayErrorContext, Client};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument};

use crate::config::StorageConfig;
use crate::error::{IngestError, Result};

/// Read-only object storage capability
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy the full object at `bucket`/`key` into `dest`, returning the byte count.
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        dest: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64>;
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        debug!(?config, "Initializing storage");

        let mut builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "rowpipe-storage");
                aws_sdk_s3::Config::builder()
                    .behavior_version_latest()
                    .credentials_provider(credentials)
                    .region(Region::new(config.region.clone()))
            },
            _ => {
                let shared = aws_config::from_env()
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };

        builder = builder.force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(region = %config.region, endpoint = ?config.endpoint, "Storage client initialized");

        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, dest))]
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        dest: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64> {
        let failed = |message: String| IngestError::Acquire {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| failed(DisplayErrorContext(&e).to_string()))?;

        let mut body = response.body;
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| failed(e.to_string()))?;
            dest.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        dest.flush().await?;

        debug!("Downloaded {} bytes from s3://{}/{}", written, bucket, key);
        Ok(written)
    }
}
