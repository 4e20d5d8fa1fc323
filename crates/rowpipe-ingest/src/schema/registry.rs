//! Schema registry client
//!
//! Speaks the Confluent-compatible REST API:
//!
//! - `POST /subjects/{subject}/versions` registers a schema body (or returns
//!   the id of an identical, already registered body)
//! - `GET /schemas/ids/{id}` fetches a schema body by id

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{IngestError, Result};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// Encoding format of a registered schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaFormat {
    Avro,
}

/// Remote schema registry capability
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Register `schema` under `subject`, returning its id.
    ///
    /// Idempotent: registering the same body under the same subject again
    /// returns the same id.
    async fn register(&self, subject: &str, schema: &str, format: SchemaFormat) -> Result<i32>;

    /// Fetch the schema body stored under `id`.
    async fn fetch(&self, id: i32) -> Result<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    schema: &'a str,
    schema_type: SchemaFormat,
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: i32,
}

#[derive(Deserialize)]
struct SchemaResponse {
    schema: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error_code: i32,
    message: String,
}

/// HTTP client for a Confluent-compatible registry
#[derive(Clone)]
pub struct HttpSchemaRegistry {
    client: Client,
    base_url: String,
}

impl HttpSchemaRegistry {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn describe_failure(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ErrorResponse>().await {
            Ok(body) => format!("{} (error code {}): {}", status, body.error_code, body.message),
            Err(_) => status.to_string(),
        }
    }
}

#[async_trait]
impl SchemaRegistry for HttpSchemaRegistry {
    #[instrument(skip(self, schema))]
    async fn register(&self, subject: &str, schema: &str, format: SchemaFormat) -> Result<i32> {
        let url = format!("{}/subjects/{}/versions", self.base_url, subject);
        let failed = |message: String| IngestError::SchemaRegistration {
            subject: subject.to_string(),
            message,
        };

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .json(&RegisterRequest {
                schema,
                schema_type: format,
            })
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(Self::describe_failure(response).await));
        }

        let body: RegisterResponse = response.json().await.map_err(|e| failed(e.to_string()))?;
        debug!(subject, id = body.id, "Schema registered");
        Ok(body.id)
    }

    #[instrument(skip(self))]
    async fn fetch(&self, id: i32) -> Result<String> {
        let url = format!("{}/schemas/ids/{}", self.base_url, id);
        let not_found = |message: String| IngestError::SchemaNotFound { id, message };

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| not_found(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let body: SchemaResponse =
                    response.json().await.map_err(|e| not_found(e.to_string()))?;
                Ok(body.schema)
            },
            StatusCode::NOT_FOUND => Err(not_found("no such schema id".to_string())),
            _ => Err(not_found(Self::describe_failure(response).await)),
        }
    }
}
