//! Header row resolution
//!
//! Maps each expected field name to its column position in a file's header
//! row. Resolution is all-or-nothing: a file whose header row lacks any
//! expected field is rejected before a single data row is read.

use std::collections::HashMap;

use crate::error::{IngestError, Result};

/// Column positions of the expected fields for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    /// Column of `field`, if it was one of the expected headers.
    pub fn position(&self, field: &str) -> Option<usize> {
        self.positions.get(field).copied()
    }

    /// Cell for `field` in `row`.
    ///
    /// Fails when `field` was never resolved or when the row is too short to
    /// hold the resolved column.
    pub fn cell<'r>(&self, row: &'r [String], field: &str) -> Result<&'r str> {
        let index = self.position(field).ok_or_else(|| IngestError::MissingHeaders {
            missing: vec![field.to_string()],
            observed: self.fields().map(str::to_string).collect(),
        })?;

        row.get(index)
            .map(String::as_str)
            .ok_or_else(|| IngestError::ShortRow {
                field: field.to_string(),
                index,
                len: row.len(),
            })
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Resolve `expected` against `header_row`.
///
/// Matching is exact (case-sensitive, no trimming). Unrecognised columns are
/// ignored. When a name appears more than once the last occurrence wins.
pub fn resolve<S: AsRef<str>>(expected: &[S], header_row: &[String]) -> Result<HeaderIndex> {
    let mut slots: HashMap<String, Option<usize>> = expected
        .iter()
        .map(|name| (name.as_ref().to_string(), None))
        .collect();

    for (index, cell) in header_row.iter().enumerate() {
        if let Some(slot) = slots.get_mut(cell.as_str()) {
            *slot = Some(index);
        }
    }

    let mut missing: Vec<String> = slots
        .iter()
        .filter(|(_, slot)| slot.is_none())
        .map(|(name, _)| name.clone())
        .collect();

    if !missing.is_empty() {
        missing.sort();
        return Err(IngestError::MissingHeaders {
            missing,
            observed: header_row.to_vec(),
        });
    }

    let positions = slots
        .into_iter()
        .filter_map(|(name, slot)| slot.map(|index| (name, index)))
        .collect();

    Ok(HeaderIndex { positions })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    const ORG: [&str; 3] = ["uuid", "name", "owner_user_uuid"];

    #[test]
    fn test_resolves_reordered_headers() {
        let index = resolve(&ORG, &row(&["owner_user_uuid", "uuid", "name"])).unwrap();
        assert_eq!(index.position("owner_user_uuid"), Some(0));
        assert_eq!(index.position("uuid"), Some(1));
        assert_eq!(index.position("name"), Some(2));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let index = resolve(&ORG, &row(&["created_at", "uuid", "x", "name", "owner_user_uuid"]))
            .unwrap();
        assert_eq!(index.position("uuid"), Some(1));
        assert_eq!(index.position("created_at"), None);
    }

    #[test]
    fn test_missing_headers_are_all_reported() {
        let err = resolve(&ORG, &row(&["name"])).unwrap_err();
        match err {
            IngestError::MissingHeaders { missing, observed } => {
                assert_eq!(missing, vec!["owner_user_uuid", "uuid"]);
                assert_eq!(observed, vec!["name"]);
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_matching_is_case_sensitive_and_untrimmed() {
        assert!(resolve(&ORG, &row(&["UUID", "name", "owner_user_uuid"])).is_err());
        assert!(resolve(&ORG, &row(&[" uuid", "name", "owner_user_uuid"])).is_err());
    }

    #[test]
    fn test_duplicate_header_last_occurrence_wins() {
        let index = resolve(&ORG, &row(&["uuid", "name", "uuid", "owner_user_uuid"])).unwrap();
        assert_eq!(index.position("uuid"), Some(2));
    }

    #[test]
    fn test_empty_header_row_rejects_everything() {
        let err = resolve(&ORG, &[]).unwrap_err();
        assert!(matches!(err, IngestError::MissingHeaders { ref missing, .. } if missing.len() == 3));
    }

    #[test]
    fn test_cell_lookup() {
        let index = resolve(&ORG, &row(&["uuid", "name", "owner_user_uuid"])).unwrap();
        let data = row(&["u-1", "Acme", "o-1"]);
        assert_eq!(index.cell(&data, "name").unwrap(), "Acme");

        let short = row(&["u-1"]);
        assert!(matches!(
            index.cell(&short, "owner_user_uuid").unwrap_err(),
            IngestError::ShortRow { index: 2, len: 1, .. }
        ));
        assert!(index.cell(&data, "region").is_err());
    }
}
