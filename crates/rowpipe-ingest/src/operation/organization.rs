//! Organization rows
//!
//! Files dropped in the organization bucket carry one organization per row:
//!
//! ```text
//! uuid,name,owner_user_uuid
//! 5f1c...,Acme Academy,9b2e...
//! ```

use apache_avro::Schema;
use serde::{Deserialize, Serialize};

use super::{EncodeContext, RecordType};
use crate::error::{IngestError, Result};

pub const UUID: &str = "uuid";
pub const NAME: &str = "name";
pub const OWNER_USER_UUID: &str = "owner_user_uuid";

const HEADERS: [&str; 3] = [UUID, NAME, OWNER_USER_UUID];

/// Avro schema registered for organization topics.
pub const SCHEMA: &str = r#"{
  "type": "record",
  "name": "Organization",
  "namespace": "rowpipe.organization",
  "fields": [
    {
      "name": "payload",
      "type": {
        "type": "record",
        "name": "OrganizationPayload",
        "fields": [
          { "name": "uuid", "type": "string" },
          { "name": "name", "type": "string" },
          { "name": "owner_user_uuid", "type": "string" }
        ]
      }
    },
    {
      "name": "metadata",
      "type": {
        "type": "record",
        "name": "OrganizationMetadata",
        "fields": [
          { "name": "origin_application", "type": "string" },
          { "name": "region", "type": "string" },
          { "name": "tracking_uuid", "type": "string" }
        ]
      }
    }
  ]
}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationPayload {
    pub uuid: String,
    pub name: String,
    pub owner_user_uuid: String,
}

/// Lineage fields attached to every organization record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationMetadata {
    pub origin_application: String,
    pub region: String,
    pub tracking_uuid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub payload: OrganizationPayload,
    pub metadata: OrganizationMetadata,
}

pub struct Organization {
    schema: Schema,
}

impl Organization {
    pub fn new() -> Result<Self> {
        let schema = Schema::parse_str(SCHEMA).map_err(|source| IngestError::InvalidSchema {
            record_type: "organization".to_string(),
            source,
        })?;
        Ok(Self { schema })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn record(&self, row: &[String], ctx: &EncodeContext<'_>) -> Result<OrganizationRecord> {
        let cell = |field: &str| ctx.headers.cell(row, field).map(str::to_string);

        Ok(OrganizationRecord {
            payload: OrganizationPayload {
                uuid: cell(UUID)?,
                name: cell(NAME)?,
                owner_user_uuid: cell(OWNER_USER_UUID)?,
            },
            metadata: OrganizationMetadata {
                origin_application: ctx.tracking.origin.clone(),
                region: ctx.tracking.region.clone(),
                tracking_uuid: ctx.tracking.tracking_id.clone(),
            },
        })
    }
}

impl RecordType for Organization {
    fn name(&self) -> &'static str {
        "organization"
    }

    fn schema_body(&self) -> &str {
        SCHEMA
    }

    fn expected_headers(&self) -> &[&'static str] {
        &HEADERS
    }

    fn encode_payload(&self, row: &[String], ctx: &EncodeContext<'_>) -> Result<Vec<u8>> {
        let record = self.record(row, ctx)?;
        let value = apache_avro::to_value(&record)?;
        Ok(apache_avro::to_avro_datum(&self.schema, value)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::event::TrackingContext;
    use crate::header;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_encoded_payload_decodes_to_row_values() {
        let org = Organization::new().unwrap();
        let headers =
            header::resolve(org.expected_headers(), &strings(&["name", "owner_user_uuid", "uuid"]))
                .unwrap();
        let tracking = TrackingContext::new("eu-west-1");
        let ctx = EncodeContext {
            headers: &headers,
            tracking: &tracking,
            schema_id: 1,
        };

        let bytes = org
            .encode_payload(&strings(&["Acme Academy", "owner-1", "org-1"]), &ctx)
            .unwrap();
        let value = apache_avro::from_avro_datum(org.schema(), &mut bytes.as_slice(), None).unwrap();
        let decoded: OrganizationRecord = apache_avro::from_value(&value).unwrap();

        assert_eq!(decoded.payload.uuid, "org-1");
        assert_eq!(decoded.payload.name, "Acme Academy");
        assert_eq!(decoded.payload.owner_user_uuid, "owner-1");
        assert_eq!(decoded.metadata.origin_application, "s3");
        assert_eq!(decoded.metadata.region, "eu-west-1");
        assert_eq!(decoded.metadata.tracking_uuid, tracking.tracking_id);
    }

    #[test]
    fn test_short_row_fails_to_encode() {
        let org = Organization::new().unwrap();
        let headers = header::resolve(org.expected_headers(), &strings(&HEADERS)).unwrap();
        let tracking = TrackingContext::new("eu-west-1");
        let ctx = EncodeContext {
            headers: &headers,
            tracking: &tracking,
            schema_id: 1,
        };

        let err = org.encode_payload(&strings(&["org-1"]), &ctx).unwrap_err();
        assert!(matches!(err, IngestError::ShortRow { .. }));
    }
}
