//! Record types for ragstore collections.
//!
//! Callers build an [`UpsertRecord`] from content plus metadata admitted through
//! a [`MetaFields`] allow-list. Stored records come back as [`VectorRecord`],
//! which never carries the raw vector.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// A scalar metadata value attached to a record.
///
/// Untagged so collection files hold plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean value (`true` / `false`).
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
}

impl MetadataValue {
    /// Returns the string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Integer(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Boolean(v)
    }
}

/// Metadata fields of one record. Ordered for stable file output.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Allow-list of metadata field names a collection persists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaFields {
    fields: BTreeSet<String>,
}

impl MetaFields {
    /// Allow-list of the given field names.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Keeps only allow-listed fields of `raw`.
    pub fn admit<I, K, V>(&self, raw: I) -> Metadata
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MetadataValue>,
    {
        raw.into_iter()
            .filter_map(|(k, v)| {
                let key: String = k.into();
                self.fields.contains(&key).then(|| (key, v.into()))
            })
            .collect()
    }
}

impl From<&BTreeSet<String>> for MetaFields {
    fn from(fields: &BTreeSet<String>) -> Self {
        Self {
            fields: fields.clone(),
        }
    }
}

/// Input to an upsert: the text to embed plus admitted metadata.
#[derive(Debug, Clone, Default)]
pub struct UpsertRecord {
    /// Text handed to the embedding function.
    pub content: String,
    pub metadata: Metadata,
}

impl UpsertRecord {
    /// Record with `content` and no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Adds a single metadata field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A stored record as returned by point lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    /// Unix seconds at which the record was last upserted.
    pub created_at: i64,
    pub metadata: Metadata,
}

/// Prefix used for entity record ids.
pub const ENTITY_ID_PREFIX: &str = "ent-";

/// Deterministic id: `prefix` followed by the first 32 hex digits of SHA-256(`content`).
pub fn compute_hash_id(content: &str, prefix: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let hex = format!("{:x}", digest);
    format!("{}{}", prefix, &hex[..32])
}

/// Record id of the entity called `name`.
pub fn entity_id(name: &str) -> String {
    compute_hash_id(name, ENTITY_ID_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_drops_unlisted_fields() {
        let fields = MetaFields::new(["entity_name", "source_id"]);
        let meta = fields.admit([
            ("entity_name", MetadataValue::from("Alice")),
            ("source_id", MetadataValue::from("chunk-1")),
            ("secret", MetadataValue::from("drop me")),
        ]);
        assert_eq!(meta.len(), 2);
        assert!(!meta.contains_key("secret"));
    }

    #[test]
    fn test_untagged_json() {
        let mut meta = Metadata::new();
        meta.insert("name".into(), "x".into());
        meta.insert("n".into(), 3i64.into());
        meta.insert("ok".into(), true.into());
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"n":3,"name":"x","ok":true}"#);
        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_hash_id_is_stable() {
        let a = entity_id("Alice");
        assert_eq!(a, entity_id("Alice"));
        assert_ne!(a, entity_id("alice"));
        assert!(a.starts_with(ENTITY_ID_PREFIX));
        assert_eq!(a.len(), ENTITY_ID_PREFIX.len() + 32);
    }

    #[test]
    fn test_upsert_record_builder() {
        let rec = UpsertRecord::new("apple pie").field("file_path", "a.txt");
        assert_eq!(rec.content, "apple pie");
        assert_eq!(rec.metadata["file_path"].as_str(), Some("a.txt"));
    }
}
