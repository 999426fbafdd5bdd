//! Consolidation of the per-export artifacts into one document per product.
//!
//! The engine starts from the top-level products of the base export and then
//! runs attach passes over the child exports. Each pass owns a disjoint set
//! of entity fields:
//!
//! | pass | source | field |
//! |------|--------|-------|
//! | [`JoinEngine::attach_collections`] | collections export | `collections` |
//! | [`JoinEngine::attach_variants`] | variants export | `variants` |
//! | [`JoinEngine::attach_metafields`] | metafields export | `metafields` |
//! | [`JoinEngine::attach_images`] | base export | `images` |
//! | [`JoinEngine::attach_translations`] | translation exports | `i18n` |
//! | [`JoinEngine::attach_metafield_translations`] | translation map | `metafields[*].i18n` |
//!
//! Child rows whose `__parentId` names no base product are dropped without
//! error, and every pass is idempotent.

mod translations;

pub use translations::{MetafieldTarget, is_translatable_metafield};

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, instrument};

use product_porter_core::{
    ConsolidatedEntity, ExportRecord, MetafieldEntry, RecordKind, Variant, compare_sku,
};

use crate::artifact::{ArtifactError, ArtifactStore, CandidateNames};

/// Base export: products interleaved with their images.
pub const BASE_ARTIFACT: &str = "bulk_products_main.json";
pub const VARIANTS_ARTIFACT: &str = "bulk_products_variants.json";
pub const COLLECTIONS_ARTIFACT: &str = "bulk_products_collections.json";
pub const METAFIELDS_ARTIFACT: &str = "bulk_products_metafields.json";
/// The consolidated document.
pub const OUTPUT_ARTIFACT: &str = "products_full_with_i18n.json";

/// Field removed from every entity before output.
const STRIPPED_FIELD: &str = "options";

/// Errors that abort an assembly run.
#[derive(Debug, Error)]
pub enum JoinError {
    /// Without the base export there is nothing to consolidate.
    #[error("Base export {0} not found")]
    MissingBase(String),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Products keyed by id, in base order.
#[derive(Debug, Clone, Default)]
pub struct JoinEngine {
    entities: Vec<ConsolidatedEntity>,
    index: HashMap<String, usize>,
}

impl JoinEngine {
    /// One entity per top-level product record.
    ///
    /// Other records in the base (images, nested products) are ignored. A
    /// repeated product id replaces the earlier entity in place.
    #[must_use]
    pub fn build_base(records: &[ExportRecord]) -> Self {
        let mut engine = Self::default();
        for record in records {
            if record.kind() != RecordKind::Product || !record.is_top_level() {
                continue;
            }
            let Some(entity) = ConsolidatedEntity::from_base(record) else {
                continue;
            };
            match engine.index.get(&entity.id).copied() {
                Some(slot) => {
                    if let Some(existing) = engine.entities.get_mut(slot) {
                        *existing = entity;
                    }
                }
                None => {
                    engine.index.insert(entity.id.clone(), engine.entities.len());
                    engine.entities.push(entity);
                }
            }
        }
        engine
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ConsolidatedEntity> {
        self.index.get(id).and_then(|&slot| self.entities.get(slot))
    }

    /// Entities in base order.
    pub fn entities(&self) -> impl Iterator<Item = &ConsolidatedEntity> {
        self.entities.iter()
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut ConsolidatedEntity> {
        let slot = *self.index.get(id)?;
        self.entities.get_mut(slot)
    }

    /// The entity a child row belongs to, if its parent is known.
    fn parent_of(&mut self, record: &ExportRecord) -> Option<&mut ConsolidatedEntity> {
        let parent = record.parent_id.as_deref()?;
        self.get_mut(parent)
    }

    // =========================================================================
    // Attach passes
    // =========================================================================

    /// Append collection labels (title, else handle).
    ///
    /// Empty labels are skipped and each product's list keeps first
    /// occurrences only.
    pub fn attach_collections(&mut self, rows: &[ExportRecord]) -> usize {
        let mut attached = 0;
        for row in rows {
            let label = match row.field("title") {
                Some(Value::Null) | None => row.str_field("handle"),
                Some(title) => title.as_str(),
            };
            let Some(label) = label.filter(|l| !l.is_empty()) else {
                continue;
            };
            let Some(entity) = self.parent_of(row) else {
                continue;
            };
            if !entity.collections.iter().any(|c| c == label) {
                entity.collections.push(label.to_string());
                attached += 1;
            }
        }
        debug!(attached, "Attached collections");
        attached
    }

    /// Append variants, then order each product's variants by sku.
    ///
    /// A variant id already present on the product is not added again.
    pub fn attach_variants(&mut self, rows: &[ExportRecord]) -> usize {
        let mut attached = 0;
        for row in rows {
            if row.kind() != RecordKind::Variant {
                continue;
            }
            let Some(variant) = Variant::from_record(row) else {
                continue;
            };
            let Some(entity) = self.parent_of(row) else {
                continue;
            };
            if entity.variants.iter().any(|v| v.id == variant.id) {
                continue;
            }
            entity.variants.push(variant);
            attached += 1;
        }

        for entity in &mut self.entities {
            entity
                .variants
                .sort_by(|a, b| compare_sku(a.sku_key(), b.sku_key()));
        }
        debug!(attached, "Attached variants");
        attached
    }

    /// Record metafields under `"<namespace>.<key>"`.
    ///
    /// Rows need a namespace, a key and a `value` field. The first row for a
    /// key wins; type and value are copied as exported.
    pub fn attach_metafields(&mut self, rows: &[ExportRecord]) -> usize {
        let mut attached = 0;
        for row in rows {
            let (Some(namespace), Some(key)) =
                (row.non_empty_str("namespace"), row.non_empty_str("key"))
            else {
                continue;
            };
            if !row.has_field("value") {
                continue;
            }
            let Some(entity) = self.parent_of(row) else {
                continue;
            };

            let composite = format!("{namespace}.{key}");
            if entity.metafields.contains_key(&composite) {
                continue;
            }
            let value = match row.field("value") {
                Some(Value::Null) | None => Value::String(String::new()),
                Some(value) => value.clone(),
            };
            entity.metafields.insert(
                composite,
                MetafieldEntry {
                    kind: row.str_field("type").unwrap_or_default().to_string(),
                    value,
                    i18n: None,
                },
            );
            attached += 1;
        }
        debug!(attached, "Attached metafields");
        attached
    }

    /// Collect image URLs from the image records of the base export.
    pub fn attach_images(&mut self, base_records: &[ExportRecord]) -> usize {
        let mut attached = 0;
        for record in base_records {
            if record.kind() != RecordKind::Image {
                continue;
            }
            let Some(url) = record.str_field("url").map(str::trim).filter(|u| !u.is_empty())
            else {
                continue;
            };
            let Some(entity) = self.parent_of(record) else {
                continue;
            };
            if !entity.images.iter().any(|i| i == url) {
                entity.images.push(url.to_string());
                attached += 1;
            }
        }
        debug!(attached, "Attached images");
        attached
    }

    /// Strip non-schema fields and return entities in base order.
    #[must_use]
    pub fn finish(self) -> Vec<ConsolidatedEntity> {
        self.entities
            .into_iter()
            .map(|mut entity| {
                entity.fields.remove(STRIPPED_FIELD);
                entity
            })
            .collect()
    }
}

// =============================================================================
// Assembly
// =============================================================================

/// One step of an assembly run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinStep {
    Collections,
    Variants,
    Metafields,
    Images,
    /// Top-level field translations from the first existing candidate.
    Translations {
        locale: String,
        candidates: CandidateNames,
    },
    /// Metafield translations from a `{metafieldId: value}` map.
    MetafieldTranslations { locale: String, artifact: String },
}

/// Ordered steps plus the output name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPlan {
    pub steps: Vec<JoinStep>,
    pub output: String,
}

impl Default for JoinPlan {
    fn default() -> Self {
        Self {
            steps: vec![
                JoinStep::Collections,
                JoinStep::Variants,
                JoinStep::Metafields,
                JoinStep::Images,
                JoinStep::Translations {
                    locale: "zh-TW".to_string(),
                    candidates: CandidateNames::new([
                        "bulk_products_translations_zh-TW.json",
                        "bulk_products_translations_zhTW.json",
                        "bulk_products_translations_tw.json",
                    ]),
                },
                JoinStep::Translations {
                    locale: "ja".to_string(),
                    candidates: CandidateNames::new(["bulk_products_translations_ja.json"]),
                },
                JoinStep::Translations {
                    locale: "en".to_string(),
                    candidates: CandidateNames::new(["bulk_products_translations_en.json"]),
                },
                JoinStep::MetafieldTranslations {
                    locale: "zh-TW".to_string(),
                    artifact: "metafield_translations_zhTW.json".to_string(),
                },
            ],
            output: OUTPUT_ARTIFACT.to_string(),
        }
    }
}

/// Result of [`assemble`].
#[derive(Debug, Clone)]
pub struct AssembleSummary {
    pub entities: usize,
    pub output: PathBuf,
}

/// Run `plan` over the artifacts in `store` and write the consolidated output.
///
/// Missing or unparseable child artifacts skip their step with a warning.
///
/// # Errors
///
/// Returns `JoinError::MissingBase` without the base export, or an artifact
/// error if the base cannot be parsed, a child cannot be read, or the output
/// cannot be written.
#[instrument(skip_all, fields(steps = plan.steps.len()))]
pub fn assemble<S: ArtifactStore>(store: &S, plan: &JoinPlan) -> Result<AssembleSummary, JoinError> {
    let base: Vec<ExportRecord> = store
        .try_load(BASE_ARTIFACT)?
        .ok_or_else(|| JoinError::MissingBase(BASE_ARTIFACT.to_string()))?;
    let mut engine = JoinEngine::build_base(&base);
    info!(products = engine.len(), "Built base");

    let mut loaded = LoadedRows::default();
    for step in &plan.steps {
        let attached = match step {
            JoinStep::Collections => loaded
                .get(store, COLLECTIONS_ARTIFACT)?
                .map(|rows| engine.attach_collections(rows)),
            JoinStep::Variants => loaded
                .get(store, VARIANTS_ARTIFACT)?
                .map(|rows| engine.attach_variants(rows)),
            JoinStep::Metafields => loaded
                .get(store, METAFIELDS_ARTIFACT)?
                .map(|rows| engine.attach_metafields(rows)),
            JoinStep::Images => Some(engine.attach_images(&base)),
            JoinStep::Translations { locale, candidates } => {
                engine.attach_translations(store, locale, candidates)?
            }
            JoinStep::MetafieldTranslations { locale, artifact } => {
                match (
                    store.load_optional::<Map<String, Value>>(artifact)?,
                    loaded.get(store, METAFIELDS_ARTIFACT)?,
                ) {
                    (Some(map), Some(rows)) => {
                        Some(engine.attach_metafield_translations(locale, &map, rows))
                    }
                    _ => None,
                }
            }
        };
        match attached {
            Some(count) => info!(step = ?step, attached = count, "Step complete"),
            None => debug!(step = ?step, "Source artifact missing, step skipped"),
        }
    }

    let entities = engine.finish();
    let output = store.save(&plan.output, &entities)?;
    info!(entities = entities.len(), output = %output.display(), "Assembly complete");

    Ok(AssembleSummary {
        entities: entities.len(),
        output,
    })
}

/// Child exports loaded at most once per run.
#[derive(Default)]
struct LoadedRows {
    rows: HashMap<&'static str, Option<Vec<ExportRecord>>>,
}

impl LoadedRows {
    fn get<S: ArtifactStore>(
        &mut self,
        store: &S,
        name: &'static str,
    ) -> Result<Option<&[ExportRecord]>, ArtifactError> {
        if !self.rows.contains_key(name) {
            let rows = store.load_optional(name)?;
            self.rows.insert(name, rows);
        }
        Ok(self.rows.get(name).and_then(Option::as_deref))
    }
}
