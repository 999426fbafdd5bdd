//! Translation export row shapes.
//!
//! Translation exports arrive in two shapes depending on how the query was
//! written:
//!
//! - nested: `{ resourceId, translations: [{ key, value, locale }, ...] }`
//! - flat: `{ resourceId, key, value, locale }`, one fact per row
//!
//! Both normalize to the same `(owner, key -> value)` facts. Rows of any other
//! shape are skipped whole.

use serde_json::Value;

use super::record::ExportRecord;

/// A single translated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationFact {
    pub key: String,
    pub value: String,
}

impl TranslationFact {
    fn from_parts(key: &Value, value: Option<&Value>) -> Option<Self> {
        let key = key.as_str()?;
        Some(Self {
            key: key.to_string(),
            value: stringify(value),
        })
    }
}

/// A recognized translation row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationRow {
    /// A resource with a list of translated fields.
    Nested {
        owner: String,
        translations: Vec<TranslationFact>,
    },
    /// A single translated field.
    Flat { owner: String, fact: TranslationFact },
}

impl TranslationRow {
    /// Recognize a row, or `None` if it has no owner or an unknown shape.
    ///
    /// The owner is `resourceId`, falling back to `__parentId`, then `id`.
    /// Nested entries whose `key` is not a string are dropped individually.
    #[must_use]
    pub fn from_record(record: &ExportRecord) -> Option<Self> {
        let owner = record
            .non_empty_str("resourceId")
            .or(record.parent_id.as_deref())
            .or(record.id.as_deref())
            .filter(|owner| !owner.is_empty())?
            .to_string();

        if let Some(entries) = record.field("translations").and_then(Value::as_array) {
            let translations = entries
                .iter()
                .filter_map(|entry| {
                    TranslationFact::from_parts(entry.get("key")?, entry.get("value"))
                })
                .collect();
            return Some(Self::Nested {
                owner,
                translations,
            });
        }

        let fact = TranslationFact::from_parts(record.field("key")?, record.field("value"))?;
        Some(Self::Flat { owner, fact })
    }

    /// The id of the translated resource.
    #[must_use]
    pub fn owner(&self) -> &str {
        match self {
            Self::Nested { owner, .. } | Self::Flat { owner, .. } => owner,
        }
    }

    /// The translated fields carried by this row.
    #[must_use]
    pub fn facts(&self) -> &[TranslationFact] {
        match self {
            Self::Nested { translations, .. } => translations,
            Self::Flat { fact, .. } => std::slice::from_ref(fact),
        }
    }
}

/// Strings pass through, `null`/missing become empty, anything else is JSON text.
#[must_use]
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> ExportRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_nested_shape() {
        let row = TranslationRow::from_record(&record(json!({
            "resourceId": "gid://shopify/Product/1",
            "translations": [
                {"key": "title", "value": "光纖跳線", "locale": "zh-TW"},
                {"key": 5, "value": "ignored", "locale": "zh-TW"},
                {"key": "body_html", "value": null, "locale": "zh-TW"}
            ]
        })))
        .unwrap();

        assert_eq!(row.owner(), "gid://shopify/Product/1");
        assert_eq!(
            row.facts(),
            &[
                TranslationFact {
                    key: "title".to_string(),
                    value: "光纖跳線".to_string()
                },
                TranslationFact {
                    key: "body_html".to_string(),
                    value: String::new()
                },
            ]
        );
    }

    #[test]
    fn test_flat_shape() {
        let row = TranslationRow::from_record(&record(json!({
            "resourceId": "gid://shopify/Product/1",
            "key": "meta_description",
            "value": "說明",
            "locale": "zh-TW"
        })))
        .unwrap();

        assert!(matches!(row, TranslationRow::Flat { .. }));
        assert_eq!(row.facts().len(), 1);
        assert_eq!(row.facts()[0].key, "meta_description");
    }

    #[test]
    fn test_shapes_normalize_to_same_facts() {
        let nested = TranslationRow::from_record(&record(json!({
            "resourceId": "P1",
            "translations": [{"key": "title", "value": "光纖", "locale": "zh-TW"}]
        })))
        .unwrap();
        let flat = TranslationRow::from_record(&record(json!({
            "resourceId": "P1",
            "key": "title",
            "value": "光纖",
            "locale": "zh-TW"
        })))
        .unwrap();

        assert_eq!(nested.owner(), flat.owner());
        assert_eq!(nested.facts(), flat.facts());
    }

    #[test]
    fn test_owner_fallbacks() {
        let row = TranslationRow::from_record(&record(json!({
            "__parentId": "gid://shopify/Product/2",
            "key": "title",
            "value": "x"
        })))
        .unwrap();
        assert_eq!(row.owner(), "gid://shopify/Product/2");

        let row = TranslationRow::from_record(&record(json!({
            "id": "gid://shopify/Product/3",
            "key": "title",
            "value": "y"
        })))
        .unwrap();
        assert_eq!(row.owner(), "gid://shopify/Product/3");
    }

    #[test]
    fn test_unknown_shapes_are_skipped() {
        assert!(
            TranslationRow::from_record(&record(json!({"resourceId": "P1", "foo": "bar"})))
                .is_none()
        );
        assert!(
            TranslationRow::from_record(&record(json!({"resourceId": "P1", "key": 3}))).is_none()
        );
        assert!(TranslationRow::from_record(&record(json!({"key": "title", "value": "x"}))).is_none());
    }

    #[test]
    fn test_non_string_values_are_stringified() {
        let row = TranslationRow::from_record(&record(json!({
            "resourceId": "P1",
            "key": "count",
            "value": 3
        })))
        .unwrap();
        assert_eq!(row.facts()[0].value, "3");
    }
}
