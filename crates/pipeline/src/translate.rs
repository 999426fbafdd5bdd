//! Metafield translation fetcher.
//!
//! Bulk exports cannot include metafield translations, so they are looked up
//! by id in batches through `translatableResourcesByIds` and stored as a
//! `{metafieldId: translatedValue}` map for the join engine.
//!
//! A failed batch is logged and its translations are lost; the loop moves on
//! to the next batch. Callers may opt into retrying each batch with
//! [`FetchOptions::retry`].

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, instrument};

use product_porter_core::{ExportRecord, RecordKind};

use crate::artifact::{ArtifactError, ArtifactStore};
use crate::config::{MAX_TRANSLATION_BATCH_SIZE, TranslationSettings};
use crate::join::{METAFIELDS_ARTIFACT, is_translatable_metafield};
use crate::retry::{RetryPolicy, with_retry};
use crate::shopify::queries::{self, TranslatableResourcesResponse};
use crate::shopify::{AdminClient, ShopifyError};

/// Errors that abort a fetch run.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The metafields export has not been produced yet.
    #[error("Metafields export {0} not found")]
    MissingSource(String),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// A resource's translated `value` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedValue {
    pub resource_id: String,
    pub value: String,
    pub locale: String,
}

/// Remote translation lookup by resource id.
pub trait TranslationLookup {
    /// Translated `value` fields of `ids` in `locale`.
    ///
    /// Resources without a non-empty translation are omitted.
    fn lookup(
        &self,
        ids: &[String],
        locale: &str,
    ) -> impl Future<Output = Result<Vec<TranslatedValue>, ShopifyError>>;
}

impl TranslationLookup for AdminClient {
    async fn lookup(
        &self,
        ids: &[String],
        locale: &str,
    ) -> Result<Vec<TranslatedValue>, ShopifyError> {
        let response: TranslatableResourcesResponse = self
            .execute(
                queries::TRANSLATABLE_RESOURCES_BY_IDS,
                Some(json!({ "ids": ids, "locale": locale })),
            )
            .await?;

        Ok(response
            .translatable_resources_by_ids
            .edges
            .into_iter()
            .filter_map(|edge| {
                let node = edge.node;
                let translation = node
                    .translations
                    .into_iter()
                    .find(|t| t.key == "value" && t.value.as_deref().is_some_and(|v| !v.is_empty()))?;
                Some(TranslatedValue {
                    resource_id: node.resource_id,
                    value: translation.value.unwrap_or_default(),
                    locale: translation.locale,
                })
            })
            .collect())
    }
}

/// How a fetch run batches and paces its lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub locale: String,
    /// Ids per lookup, at most 250.
    pub batch_size: usize,
    /// Pause after every batch, successful or not.
    pub delay: Duration,
    /// Retry each failed batch; `None` logs and moves on.
    pub retry: Option<RetryPolicy>,
}

impl FetchOptions {
    #[must_use]
    pub fn new(locale: impl Into<String>, settings: &TranslationSettings) -> Self {
        Self {
            locale: locale.into(),
            batch_size: settings.batch_size,
            delay: settings.delay,
            retry: None,
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

/// Result of a fetch run.
#[derive(Debug, Clone)]
pub struct FetchSummary {
    pub requested: usize,
    pub translated: usize,
    pub failed_batches: usize,
    pub output: PathBuf,
}

/// Artifact name for a locale: `metafield_translations_zhTW.json` for `zh-TW`.
#[must_use]
pub fn output_artifact(locale: &str) -> String {
    let tag: String = locale.chars().filter(|c| *c != '-').collect();
    format!("metafield_translations_{tag}.json")
}

/// Unique allow-listed metafield ids, in export order.
#[must_use]
pub fn translatable_metafield_ids(rows: &[ExportRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| row.kind() == RecordKind::Metafield)
        .filter(|row| {
            matches!(
                (row.str_field("namespace"), row.str_field("key")),
                (Some(ns), Some(key)) if is_translatable_metafield(ns, key)
            )
        })
        .filter_map(|row| row.id.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Fetch translations for every allow-listed metafield and write the map.
///
/// # Errors
///
/// Returns `TranslateError::MissingSource` without the metafields export, or
/// an artifact error if it cannot be parsed or the output written. Lookup
/// failures never abort the run.
#[instrument(skip_all, fields(locale = %options.locale))]
pub async fn fetch_metafield_translations<L, S>(
    lookup: &L,
    store: &S,
    options: &FetchOptions,
) -> Result<FetchSummary, TranslateError>
where
    L: TranslationLookup,
    S: ArtifactStore,
{
    let rows: Vec<ExportRecord> = store
        .try_load(METAFIELDS_ARTIFACT)?
        .ok_or_else(|| TranslateError::MissingSource(METAFIELDS_ARTIFACT.to_string()))?;
    let ids = translatable_metafield_ids(&rows);
    let batch_size = options.batch_size.clamp(1, MAX_TRANSLATION_BATCH_SIZE);
    let batches: Vec<&[String]> = ids.chunks(batch_size).collect();
    info!(metafields = ids.len(), batches = batches.len(), "Fetching metafield translations");

    let mut results: IndexMap<String, String> = IndexMap::new();
    let mut failed_batches = 0;

    for (i, batch) in batches.iter().enumerate() {
        let outcome = match options.retry {
            Some(policy) => with_retry(policy, || lookup.lookup(batch, &options.locale)).await,
            None => lookup.lookup(batch, &options.locale).await,
        };

        match outcome {
            Ok(values) => {
                for item in values {
                    if !item.value.is_empty() {
                        results.insert(item.resource_id, item.value);
                    }
                }
                info!(
                    batch = i + 1,
                    batches = batches.len(),
                    total = results.len(),
                    "Batch complete"
                );
            }
            Err(e) => {
                failed_batches += 1;
                error!(batch = i + 1, batches = batches.len(), error = %e, "Batch failed");
            }
        }

        tokio::time::sleep(options.delay).await;
    }

    let output = store.save(&output_artifact(&options.locale), &results)?;
    info!(translated = results.len(), output = %output.display(), "Wrote metafield translations");

    Ok(FetchSummary {
        requested: ids.len(),
        translated: results.len(),
        failed_batches,
        output,
    })
}
