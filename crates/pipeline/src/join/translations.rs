//! Translation passes of the join engine.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use product_porter_core::{ExportRecord, MetafieldEntry, RecordKind, TranslationRow, stringify};

use super::JoinEngine;
use crate::artifact::{ArtifactError, ArtifactStore, CandidateNames};

/// Whether a metafield's translations are fetched and merged.
///
/// Only `content.*` and `theme.shipping_time` are surfaced downstream.
#[must_use]
pub fn is_translatable_metafield(namespace: &str, key: &str) -> bool {
    namespace == "content" || (namespace == "theme" && key == "shipping_time")
}

/// Where a translatable metafield lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetafieldTarget {
    pub product_id: String,
    /// `"<namespace>.<key>"`.
    pub composite_key: String,
    pub kind: String,
}

impl MetafieldTarget {
    /// Index the allow-listed metafields of an export by metafield id.
    #[must_use]
    pub fn index(rows: &[ExportRecord]) -> HashMap<String, Self> {
        rows.iter()
            .filter_map(|row| {
                if row.kind() != RecordKind::Metafield {
                    return None;
                }
                let id = row.id.as_deref()?;
                let product_id = row.parent_id.as_deref()?;
                let namespace = row.non_empty_str("namespace")?;
                let key = row.non_empty_str("key")?;
                if !is_translatable_metafield(namespace, key) {
                    return None;
                }
                Some((
                    id.to_string(),
                    Self {
                        product_id: product_id.to_string(),
                        composite_key: format!("{namespace}.{key}"),
                        kind: row.str_field("type").unwrap_or_default().to_string(),
                    },
                ))
            })
            .collect()
    }
}

impl JoinEngine {
    /// Merge the first existing translation export among `candidates`.
    ///
    /// Candidates that do not parse are skipped. Returns `Ok(None)` if none
    /// is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if a candidate exists but cannot be read.
    pub fn attach_translations<S: ArtifactStore>(
        &mut self,
        store: &S,
        locale: &str,
        candidates: &CandidateNames,
    ) -> Result<Option<usize>, ArtifactError> {
        let Some(resolved) = candidates.resolve::<_, Vec<ExportRecord>>(store)? else {
            return Ok(None);
        };
        debug!(locale, artifact = %resolved.name, "Resolved translation export");
        Ok(Some(self.merge_translation_rows(locale, &resolved.value)))
    }

    /// Write every recognized row into `i18n[locale]`.
    ///
    /// Nested and flat rows land in the same place; rows of any other shape
    /// and rows for unknown products are skipped.
    pub fn merge_translation_rows(&mut self, locale: &str, rows: &[ExportRecord]) -> usize {
        let mut merged = 0;
        for row in rows {
            let Some(row) = TranslationRow::from_record(row) else {
                continue;
            };
            let Some(entity) = self.get_mut(row.owner()) else {
                continue;
            };
            let fields = entity.i18n.entry(locale.to_string()).or_default();
            for fact in row.facts() {
                fields.insert(fact.key.clone(), fact.value.clone());
                merged += 1;
            }
        }
        merged
    }

    /// Merge `{metafieldId: value}` translations through the metafields export.
    ///
    /// Metafields outside the allow-list are ignored. A translated metafield
    /// the entity does not have yet gets an empty-valued entry first.
    pub fn attach_metafield_translations(
        &mut self,
        locale: &str,
        translations: &Map<String, Value>,
        metafield_rows: &[ExportRecord],
    ) -> usize {
        let index = MetafieldTarget::index(metafield_rows);
        let mut merged = 0;

        for (metafield_id, value) in translations {
            let Some(target) = index.get(metafield_id) else {
                continue;
            };
            let Some(entity) = self.get_mut(&target.product_id) else {
                continue;
            };
            let entry = entity
                .metafields
                .entry(target.composite_key.clone())
                .or_insert_with(|| MetafieldEntry {
                    kind: target.kind.clone(),
                    value: Value::String(String::new()),
                    i18n: None,
                });
            entry
                .i18n
                .get_or_insert_with(IndexMap::new)
                .insert(locale.to_string(), stringify(Some(value)));
            merged += 1;
        }
        merged
    }
}
