//! The record type stored by a table: a vector, a payload, and derived
//! text tokens.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Embedding, PayloadValue, RecordId};

/// A record's key/value payload. Kept as a `BTreeMap` so iteration order
/// is deterministic, which matters for reproducible test fixtures.
pub type Payload = BTreeMap<String, PayloadValue>;

/// A stored record: a stable id, a dense vector, an arbitrary payload, and
/// the token multiset derived from the table's configured text fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Record {
    /// Stable, never-reused identifier.
    pub id: RecordId,
    /// Dense vector of the table's fixed dimension D.
    pub vector: Embedding,
    /// Arbitrary key/value payload.
    pub payload: Payload,
    /// Tokens derived from the table's configured text fields, used by the
    /// full-text index. Empty if the table has no text fields configured.
    pub text_tokens: Vec<String>,
}

impl Record {
    /// Returns the value of `field`, if present in the payload.
    pub fn field(&self, field: &str) -> Option<&PayloadValue> {
        self.payload.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_field_lookup() {
        let mut payload = Payload::new();
        payload.insert("category".to_string(), PayloadValue::String("a".into()));
        let record = Record {
            id: RecordId::new(0),
            vector: vec![1.0, 2.0],
            payload,
            text_tokens: vec![],
        };
        assert_eq!(
            record.field("category"),
            Some(&PayloadValue::String("a".into()))
        );
        assert_eq!(record.field("missing"), None);
    }
}
