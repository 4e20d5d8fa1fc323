//! Schema-registry wire framing
//!
//! ```text
//! +--------+----------------------+------------------------+
//! | 0x00   | schema id (u32 BE)   | schema-encoded payload |
//! +--------+----------------------+------------------------+
//!   1 byte        4 bytes               remaining bytes
//! ```
//!
//! The layout is shared with every existing consumer of the topics and must
//! stay bit-exact.

use crate::error::{IngestError, Result};

/// Reserved leading byte of every framed record.
pub const MAGIC_BYTE: u8 = 0;

/// Marker byte plus schema id.
pub const HEADER_LEN: usize = 5;

/// Prefix `payload` with the marker byte and the big-endian schema id.
pub fn frame(schema_id: i32, payload: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(HEADER_LEN + payload.len());
    record.push(MAGIC_BYTE);
    record.extend_from_slice(&(schema_id as u32).to_be_bytes());
    record.extend_from_slice(payload);
    record
}

/// Split a framed record into its schema id and payload.
pub fn parse(record: &[u8]) -> Result<(i32, &[u8])> {
    if record.len() < HEADER_LEN {
        return Err(IngestError::WireFormat(format!(
            "record is {} byte(s), header needs {}",
            record.len(),
            HEADER_LEN
        )));
    }
    if record[0] != MAGIC_BYTE {
        return Err(IngestError::WireFormat(format!(
            "unexpected marker byte {:#04x}",
            record[0]
        )));
    }

    let id = u32::from_be_bytes([record[1], record[2], record[3], record[4]]) as i32;
    Ok((id, &record[HEADER_LEN..]))
}
