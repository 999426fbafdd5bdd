//! The consolidated per-product document.
//!
//! One [`ConsolidatedEntity`] is produced for every top-level product in the
//! base export, whether or not any child artifact references it. The join
//! passes in the pipeline crate are the only writers.

use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use super::record::ExportRecord;

/// Locale -> field key -> translated string, in insertion order.
pub type I18n = IndexMap<String, IndexMap<String, String>>;

/// Locales every entity starts with an (empty) translation map for.
pub const DEFAULT_LOCALES: &[&str] = &["zh-TW", "ja", "en"];

/// Fields owned by the join passes; never copied from the base record.
const RESERVED_FIELDS: &[&str] = &["variants", "metafields", "collections", "i18n", "images"];

/// A denormalized product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedEntity {
    pub id: String,
    /// Scalar fields copied from the base record.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    /// `"<namespace>.<key>"` -> metafield, in export order.
    #[serde(default)]
    pub metafields: IndexMap<String, MetafieldEntry>,
    /// Collection labels, unique, first occurrence order.
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub i18n: I18n,
    /// Image URLs, unique, stream order.
    #[serde(default)]
    pub images: Vec<String>,
}

impl ConsolidatedEntity {
    /// Start an entity from a top-level base record.
    ///
    /// Returns `None` if the record has no id.
    #[must_use]
    pub fn from_base(record: &ExportRecord) -> Option<Self> {
        let id = record.id.clone()?;
        let mut fields = record.fields.clone();
        for name in RESERVED_FIELDS {
            fields.remove(*name);
        }
        let i18n = DEFAULT_LOCALES
            .iter()
            .map(|locale| ((*locale).to_string(), IndexMap::new()))
            .collect();

        Some(Self {
            id,
            fields,
            variants: Vec::new(),
            metafields: IndexMap::new(),
            collections: Vec::new(),
            i18n,
            images: Vec::new(),
        })
    }

    /// Read a scalar field as a string.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Translated value for a top-level field.
    #[must_use]
    pub fn translation(&self, locale: &str, key: &str) -> Option<&str> {
        self.i18n.get(locale)?.get(key).map(String::as_str)
    }
}

/// The subset of variant fields carried into the consolidated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    /// Money scalars are kept exactly as exported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_at_price: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
    #[serde(default)]
    pub inventory_item: Option<Value>,
}

impl Variant {
    /// Flatten a variant export record.
    ///
    /// Returns `None` if the record has no id.
    #[must_use]
    pub fn from_record(record: &ExportRecord) -> Option<Self> {
        let id = record.id.clone()?;
        let selected_options = record
            .field("selectedOptions")
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .map(|option| SelectedOption {
                        name: option.get("name").cloned().unwrap_or(Value::Null),
                        value: option.get("value").cloned().unwrap_or(Value::Null),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            id,
            title: record.str_field("title").map(String::from),
            sku: record.str_field("sku").map(String::from),
            price: non_null(record.field("price")),
            compare_at_price: non_null(record.field("compareAtPrice")),
            barcode: record.str_field("barcode").map(String::from),
            selected_options,
            inventory_item: non_null(record.field("inventoryItem")),
        })
    }

    /// The sort key; a missing sku sorts as the empty string.
    #[must_use]
    pub fn sku_key(&self) -> &str {
        self.sku.as_deref().unwrap_or("")
    }
}

fn non_null(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

/// A variant's option selection (e.g. `Length` = `3m`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedOption {
    pub name: Value,
    pub value: Value,
}

/// A metafield copied verbatim from the export, plus its translations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetafieldEntry {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub value: Value,
    /// Locale -> translated value. Created on first translation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i18n: Option<IndexMap<String, String>>,
}

/// Locale-aware comparison for sku strings.
///
/// Three levels, each consulted only on a tie of the previous one:
///
/// 1. base characters: accents and case folded away, with punctuation
///    before digits and digits before letters
/// 2. accents: an unaccented letter sorts before its accented forms
/// 3. case: lowercase sorts before uppercase
///
/// The empty string sorts before everything.
#[must_use]
pub fn compare_sku(a: &str, b: &str) -> Ordering {
    let a = collation_elements(a);
    let b = collation_elements(b);

    a.iter()
        .map(|e| e.primary)
        .cmp(b.iter().map(|e| e.primary))
        .then_with(|| a.iter().map(|e| &e.marks).cmp(b.iter().map(|e| &e.marks)))
        .then_with(|| a.iter().map(|e| e.upper).cmp(b.iter().map(|e| e.upper)))
}

/// Punctuation in collation order; anything not listed sorts after these by
/// code point.
const PUNCTUATION_ORDER: &str = "_-,;:!?.'\"()[]{}@*/\\&#%`^+<=>|~$";

/// Character classes in primary order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CharClass {
    Space,
    Punctuation,
    Symbol,
    Digit,
    Letter,
}

#[derive(Debug)]
struct CollationElement {
    primary: (CharClass, u32),
    marks: Vec<char>,
    upper: bool,
}

fn collation_elements(s: &str) -> Vec<CollationElement> {
    let mut elements: Vec<CollationElement> = Vec::new();
    for c in s.nfd() {
        if is_combining_mark(c)
            && let Some(last) = elements.last_mut()
        {
            last.marks.push(c);
            continue;
        }
        elements.push(CollationElement {
            primary: primary_weight(c),
            marks: Vec::new(),
            upper: c.is_uppercase(),
        });
    }
    elements
}

fn primary_weight(c: char) -> (CharClass, u32) {
    if c.is_whitespace() {
        return (CharClass::Space, u32::from(c));
    }
    if let Some(rank) = PUNCTUATION_ORDER.chars().position(|p| p == c) {
        return (CharClass::Punctuation, u32::try_from(rank).unwrap_or(u32::MAX));
    }
    if let Some(digit) = c.to_digit(10) {
        return (CharClass::Digit, digit);
    }
    if c.is_alphanumeric() {
        let folded = c.to_lowercase().next().unwrap_or(c);
        return (CharClass::Letter, u32::from(folded));
    }
    (CharClass::Symbol, u32::from(c))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_compare_sku_empty_first() {
        let mut skus = vec!["B", "", "A"];
        skus.sort_by(|a, b| compare_sku(a, b));
        assert_eq!(skus, vec!["", "A", "B"]);
    }

    #[test]
    fn test_compare_sku_case_insensitive_primary() {
        assert_eq!(compare_sku("a", "B"), Ordering::Less);
        assert_eq!(compare_sku("B", "a"), Ordering::Greater);
        assert_eq!(compare_sku("a", "A"), Ordering::Less);
        assert_eq!(compare_sku("sfp-10", "SFP-10"), Ordering::Less);
        assert_eq!(compare_sku("SFP-10", "SFP-10"), Ordering::Equal);
    }

    #[test]
    fn test_compare_sku_accents_fold_to_base_letter() {
        assert_eq!(compare_sku("é", "f"), Ordering::Less);
        assert_eq!(compare_sku("e", "é"), Ordering::Less);
        assert_eq!(compare_sku("é", "E"), Ordering::Greater);
        assert_eq!(compare_sku("café-2", "cafe-3"), Ordering::Less);
        assert_eq!(compare_sku("Ä1", "a2"), Ordering::Less);
    }

    #[test]
    fn test_compare_sku_punctuation_digits_letters() {
        assert_eq!(compare_sku("a_1", "a-1"), Ordering::Less);
        assert_eq!(compare_sku("a-1", "a.1"), Ordering::Less);
        assert_eq!(compare_sku("SFP-10", "SFP10"), Ordering::Less);
        assert_eq!(compare_sku("9", "a"), Ordering::Less);
        assert_eq!(compare_sku("", "-"), Ordering::Less);
    }

    #[test]
    fn test_from_base_seeds_locales_and_drops_reserved() {
        let record = ExportRecord::new("gid://shopify/Product/1")
            .with_field("title", "Patch Cord")
            .with_field("images", json!(["x"]));
        let entity = ConsolidatedEntity::from_base(&record).unwrap();

        assert_eq!(entity.id, "gid://shopify/Product/1");
        assert_eq!(entity.str_field("title"), Some("Patch Cord"));
        assert!(entity.images.is_empty());
        assert!(!entity.fields.contains_key("images"));
        assert_eq!(entity.i18n.len(), 3);
        assert!(entity.i18n["zh-TW"].is_empty());
    }

    #[test]
    fn test_i18n_serializes_in_seed_order() {
        let entity = ConsolidatedEntity::from_base(&ExportRecord::new("gid://shopify/Product/1"))
            .unwrap();
        let text = serde_json::to_string(&entity).unwrap();

        let zh = text.find("\"zh-TW\"").unwrap();
        let ja = text.find("\"ja\"").unwrap();
        let en = text.find("\"en\"").unwrap();
        assert!(zh < ja && ja < en, "{text}");
    }

    #[test]
    fn test_from_base_requires_id() {
        assert!(ConsolidatedEntity::from_base(&ExportRecord::default()).is_none());
    }

    #[test]
    fn test_variant_from_record() {
        let record = ExportRecord::new("gid://shopify/ProductVariant/9")
            .with_parent("gid://shopify/Product/1")
            .with_field("title", "3m")
            .with_field("sku", "LC-LC-3M")
            .with_field("price", "12.00")
            .with_field("compareAtPrice", Value::Null)
            .with_field("weight", 4)
            .with_field(
                "selectedOptions",
                json!([{"name": "Length", "value": "3m", "optionValue": {"id": "x"}}]),
            )
            .with_field("inventoryItem", json!({"id": "gid://shopify/InventoryItem/5", "tracked": true}));

        let variant = Variant::from_record(&record).unwrap();
        assert_eq!(variant.sku_key(), "LC-LC-3M");
        assert_eq!(variant.price, Some(json!("12.00")));
        assert!(variant.compare_at_price.is_none());
        assert_eq!(
            variant.selected_options,
            vec![SelectedOption {
                name: json!("Length"),
                value: json!("3m")
            }]
        );

        let value = serde_json::to_value(&variant).unwrap();
        assert!(value.get("weight").is_none());
        assert!(value.get("compareAtPrice").is_none());
        assert_eq!(value["inventoryItem"]["tracked"], json!(true));
    }

    #[test]
    fn test_variant_without_sku_sorts_as_empty() {
        let variant = Variant::from_record(&ExportRecord::new("gid://shopify/ProductVariant/1"))
            .unwrap();
        assert_eq!(variant.sku_key(), "");
        let value = serde_json::to_value(&variant).unwrap();
        assert_eq!(value["inventoryItem"], Value::Null);
        assert_eq!(value["selectedOptions"], json!([]));
    }

    #[test]
    fn test_entity_serializes_flat() {
        let record = ExportRecord::new("gid://shopify/Product/1").with_field("handle", "lc-lc");
        let mut entity = ConsolidatedEntity::from_base(&record).unwrap();
        entity.metafields.insert(
            "theme.shipping_time".to_string(),
            MetafieldEntry {
                kind: "single_line_text_field".to_string(),
                value: json!("3 days"),
                i18n: None,
            },
        );

        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(value["handle"], json!("lc-lc"));
        assert_eq!(
            value["metafields"]["theme.shipping_time"],
            json!({"type": "single_line_text_field", "value": "3 days"})
        );
        assert_eq!(value["collections"], json!([]));

        let back: ConsolidatedEntity = serde_json::from_value(value).unwrap();
        assert_eq!(back, entity);
    }
}
