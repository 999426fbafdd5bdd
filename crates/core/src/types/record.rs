//! One line of a bulk export result stream.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::gid::{RecordKind, classify};

/// A single decoded JSONL record.
///
/// Only `id` and `__parentId` are interpreted structurally. Every other field
/// is kept verbatim so artifacts round-trip without loss, and typed accessors
/// read the handful of fields the join passes care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExportRecord {
    /// Global id. Translation rows carry `resourceId` instead and have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Back-reference to the owning record; absent for top-level records.
    #[serde(
        rename = "__parentId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<String>,
    /// All remaining fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ExportRecord {
    /// Create a record with the given id and no other fields.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Set the parent id.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Set an arbitrary field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// The record kind, derived from the id's resource type.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.id.as_deref().map_or(RecordKind::Other, classify)
    }

    /// Whether the record has no owning record.
    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Raw field value.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Whether the field is present at all (even if `null`).
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field value if it is a JSON string.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Field value if it is a non-empty JSON string.
    #[must_use]
    pub fn non_empty_str(&self, name: &str) -> Option<&str> {
        self.str_field(name).filter(|s| !s.is_empty())
    }
}
