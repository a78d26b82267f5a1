//! Per-vector metadata, stored positionally alongside the vector buffer.

use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};

/// Where a chunk came from and what it says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub source_document_name: String,
    /// 1-based page number.
    pub page_number: u32,
    pub text: String,
}

impl MetadataRecord {
    pub fn new(source_document_name: impl Into<String>, page_number: u32, text: impl Into<String>) -> Self {
        Self {
            source_document_name: source_document_name.into(),
            page_number,
            text: text.into(),
        }
    }
}

/// Ordered records; record `i` describes vector `i` of the owning session.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    records: Vec<MetadataRecord>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<MetadataRecord>) -> Self {
        Self { records }
    }

    pub fn append(&mut self, records: Vec<MetadataRecord>) {
        self.records.extend(records);
    }

    pub fn get(&self, index: usize) -> Result<&MetadataRecord> {
        self.records.get(index).ok_or(SessionError::IndexOutOfRange {
            index,
            len: self.records.len(),
        })
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut store = MetadataStore::new();
        store.append(vec![
            MetadataRecord::new("a.pdf", 1, "first"),
            MetadataRecord::new("a.pdf", 2, "second"),
        ]);
        store.append(vec![MetadataRecord::new("b.pdf", 1, "third")]);

        assert_eq!(store.size(), 3);
        assert_eq!(store.get(1).unwrap().text, "second");
        assert_eq!(store.get(2).unwrap().source_document_name, "b.pdf");
    }

    #[test]
    fn test_get_out_of_range() {
        let store = MetadataStore::new();
        assert!(matches!(
            store.get(0),
            Err(SessionError::IndexOutOfRange { index: 0, len: 0 })
        ));
    }
}
