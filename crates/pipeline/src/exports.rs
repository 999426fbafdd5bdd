//! The product export jobs and the submit-to-artifact flow that runs them.

use std::path::Path;

use thiserror::Error;
use tracing::{info, instrument};

use crate::artifact::{ArtifactError, FsArtifactStore};
use crate::bulk::{BulkApi, BulkError, BulkJobRunner, CompletedOperation, PollOptions};
use crate::download::{self, ExportArtifacts, LinePolicy};

/// Locales exported by [`ExportJob::all`].
pub const EXPORT_LOCALES: &[&str] = &["zh-TW", "ja", "en"];

const MAIN_QUERY: &str = r"
{
  products {
    edges {
      node {
        id
        handle
        title
        descriptionHtml
        vendor
        productType
        tags
        templateSuffix
        status
        seo { title description }
        images(first: 250) {
          edges {
            node {
              id
              altText
              url
            }
          }
        }
      }
    }
  }
}
";

const VARIANTS_QUERY: &str = r"
{
  products {
    edges {
      node {
        id
        handle
        variants {
          edges {
            node {
              id
              title
              sku
              price
              compareAtPrice
              barcode
              selectedOptions { name value }
              inventoryItem { id tracked }
            }
          }
        }
      }
    }
  }
}
";

const COLLECTIONS_QUERY: &str = r"
{
  products {
    edges {
      node {
        id
        handle
        collections(first: 20) {
          edges {
            node {
              id
              title
              handle
            }
          }
        }
      }
    }
  }
}
";

const METAFIELDS_QUERY: &str = r"
{
  products {
    edges {
      node {
        id
        handle
        metafields(first: 20) {
          edges {
            node {
              id
              namespace
              key
              type
              value
            }
          }
        }
      }
    }
  }
}
";

/// Errors that end an export job.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Bulk(#[from] BulkError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// A named bulk query and how its result is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    /// Artifact base name: `<name>.jsonl`, `<name>.json`.
    pub name: String,
    pub query: String,
    /// Also write `<name>.products_only.json`.
    pub products_only: bool,
}

impl ExportJob {
    fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            products_only: false,
        }
    }

    /// Products with their images; the base of every assembly.
    #[must_use]
    pub fn main() -> Self {
        Self {
            products_only: true,
            ..Self::new("bulk_products_main", MAIN_QUERY)
        }
    }

    #[must_use]
    pub fn variants() -> Self {
        Self::new("bulk_products_variants", VARIANTS_QUERY)
    }

    #[must_use]
    pub fn collections() -> Self {
        Self::new("bulk_products_collections", COLLECTIONS_QUERY)
    }

    #[must_use]
    pub fn metafields() -> Self {
        Self::new("bulk_products_metafields", METAFIELDS_QUERY)
    }

    /// Product translations for one locale.
    #[must_use]
    pub fn translations(locale: &str) -> Self {
        let query = format!(
            r#"
{{
  translatableResources(first: 1000, resourceType: PRODUCT) {{
    edges {{
      node {{
        resourceId
        translations(locale: "{locale}") {{
          key
          value
          locale
        }}
      }}
    }}
  }}
}}
"#
        );
        Self::new(format!("bulk_products_translations_{locale}"), query)
    }

    /// Every job, in the order an assembly needs them.
    #[must_use]
    pub fn all(locales: &[&str]) -> Vec<Self> {
        let mut jobs = vec![
            Self::main(),
            Self::variants(),
            Self::collections(),
            Self::metafields(),
        ];
        jobs.extend(locales.iter().map(|locale| Self::translations(locale)));
        jobs
    }
}

/// Polling and conversion settings for an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub poll: PollOptions,
    pub line_policy: LinePolicy,
}

/// What an export produced.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub operation: CompletedOperation,
    pub bytes: u64,
    pub artifacts: ExportArtifacts,
}

/// Run `job` to completion and store its artifacts.
///
/// Submit, poll, download `<name>.jsonl`, then convert to `<name>.json`
/// (and the products-only narrowing when the job asks for it).
///
/// # Errors
///
/// Returns `ExportError::Bulk` if the job is rejected or does not complete,
/// and `ExportError::Artifact` if the download or conversion fails.
#[instrument(skip_all, fields(job = %job.name))]
pub async fn run_export<A: BulkApi>(
    api: &A,
    http: &reqwest::Client,
    store: &FsArtifactStore,
    job: &ExportJob,
    options: &ExportOptions,
) -> Result<ExportReport, ExportError> {
    let operation = BulkJobRunner::new(api, &job.name)
        .run(&job.query, &options.poll)
        .await?;

    let jsonl = store.path(&format!("{}.jsonl", job.name));
    info!(path = %jsonl.display(), "Downloading results");
    let bytes = download::download(http, &operation.url, &jsonl).await?;

    let artifacts = materialize(store, job, &jsonl, options.line_policy)?;
    Ok(ExportReport {
        operation,
        bytes,
        artifacts,
    })
}

/// Convert a downloaded result stream into the job's JSON artifacts.
///
/// # Errors
///
/// Returns an error if the stream cannot be read or decoded, or the
/// artifacts cannot be written.
pub fn materialize(
    store: &FsArtifactStore,
    job: &ExportJob,
    jsonl: &Path,
    policy: LinePolicy,
) -> Result<ExportArtifacts, ArtifactError> {
    let records = download::convert(jsonl, policy)?;
    download::export_artifacts(store, &job.name, &records, job.products_only)
}
