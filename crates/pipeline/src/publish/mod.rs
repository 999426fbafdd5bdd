//! Page publishing with a reject list.
//!
//! Rows are Notion page property objects, published one at a time with a
//! fixed pause in between. A failing row never stops the run: it is recorded
//! as a [`Reject`] and the whole list is written to
//! `notion_upload_fail_<date>.json`. [`resume`] later reloads such a list and
//! retries each row with backoff.

mod notion;

pub use notion::NotionClient;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::artifact::{ArtifactError, ArtifactStore};
use crate::progress;
use crate::retry::{Retryable, RetryPolicy, is_retryable_status, with_retry};

/// Rows to publish.
pub const ROWS_ARTIFACT: &str = "notion_products.json";
/// Prefix shared by every reject list.
pub const REJECT_PREFIX: &str = "notion_upload_fail_";

/// Errors creating a page.
#[derive(Debug, Error)]
pub enum PublishError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl Retryable for PublishError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => is_retryable_status(*status),
            Self::Http(e) => e.status().is_some_and(|s| is_retryable_status(s.as_u16())),
        }
    }
}

/// Destination for page rows.
pub trait PagePublisher {
    /// Create one page from its property object.
    fn create_page(&self, properties: &Value) -> impl Future<Output = Result<(), PublishError>>;
}

/// A row that could not be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    /// 1-based position in the rows file.
    pub index: usize,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub error: String,
}

impl Reject {
    fn new(index: usize, row: &Value, error: &PublishError) -> Self {
        Self {
            index: index + 1,
            title: row_title(row),
            handle: row_handle(row).unwrap_or_default().to_string(),
            error: error.to_string(),
        }
    }
}

/// Handle of a row: `Handle.rich_text[0].text.content`.
#[must_use]
pub fn row_handle(row: &Value) -> Option<&str> {
    row.pointer("/Handle/rich_text/0/text/content")
        .and_then(Value::as_str)
        .filter(|h| !h.is_empty())
}

/// Title of a row: the `Title.title[*].text.content` pieces joined.
#[must_use]
pub fn row_title(row: &Value) -> String {
    row.pointer("/Title/title")
        .and_then(Value::as_array)
        .map(|pieces| {
            pieces
                .iter()
                .filter_map(|piece| piece.pointer("/text/content").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

/// Pacing and retry for a publish run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
    /// Pause between rows.
    pub delay: Duration,
    /// Backoff used by [`resume`].
    pub retry: RetryPolicy,
    /// Draw a terminal progress bar.
    pub progress: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(400),
            retry: RetryPolicy::default(),
            progress: false,
        }
    }
}

/// Result of a publish or resume run.
#[derive(Debug, Clone, Default)]
pub struct PublishSummary {
    pub published: usize,
    pub rejects: Vec<Reject>,
    /// Where the rejects were written, if there were any.
    pub reject_file: Option<PathBuf>,
}

/// Reject list name for a first run on `date`.
#[must_use]
pub fn reject_artifact(date: NaiveDate) -> String {
    format!("{REJECT_PREFIX}{}.json", date.format("%Y-%m-%d"))
}

/// Reject list name for a resume run on `date`.
#[must_use]
pub fn retry_reject_artifact(date: NaiveDate) -> String {
    format!("{REJECT_PREFIX}retry_{}.json", date.format("%Y-%m-%d"))
}

/// Publish every row in order.
///
/// # Errors
///
/// Returns an error only if the reject list cannot be written.
#[instrument(skip_all, fields(rows = rows.len()))]
pub async fn publish_all<P, S>(
    publisher: &P,
    store: &S,
    rows: &[Value],
    options: &PublishOptions,
    date: NaiveDate,
) -> Result<PublishSummary, ArtifactError>
where
    P: PagePublisher,
    S: ArtifactStore,
{
    let targets: Vec<(usize, &Value)> = rows.iter().enumerate().collect();
    let rejects = run(publisher, &targets, options, None).await;
    finish(store, targets.len(), rejects, &reject_artifact(date))
}

/// Retry the rows named by a reject list.
///
/// Each reject is matched to a row by its index, falling back to its handle.
/// Rejects matching no row are skipped with a warning.
///
/// # Errors
///
/// Returns an error only if the new reject list cannot be written.
#[instrument(skip_all, fields(rows = rows.len(), rejects = rejects.len()))]
pub async fn resume<P, S>(
    publisher: &P,
    store: &S,
    rows: &[Value],
    rejects: &[Reject],
    options: &PublishOptions,
    date: NaiveDate,
) -> Result<PublishSummary, ArtifactError>
where
    P: PagePublisher,
    S: ArtifactStore,
{
    let targets: Vec<(usize, &Value)> = rejects
        .iter()
        .filter_map(|reject| {
            let matched = match_reject(rows, reject).and_then(|i| rows.get(i).map(|row| (i, row)));
            if matched.is_none() {
                warn!(index = reject.index, handle = %reject.handle, "No row matches reject");
            }
            matched
        })
        .collect();

    if targets.is_empty() {
        info!("Nothing to retry");
        return Ok(PublishSummary::default());
    }

    let rejects = run(publisher, &targets, options, Some(options.retry)).await;
    finish(store, targets.len(), rejects, &retry_reject_artifact(date))
}

/// Zero-based row position for a reject.
fn match_reject(rows: &[Value], reject: &Reject) -> Option<usize> {
    if (1..=rows.len()).contains(&reject.index) {
        return Some(reject.index - 1);
    }
    if reject.handle.is_empty() {
        return None;
    }
    rows.iter()
        .rposition(|row| row_handle(row) == Some(reject.handle.as_str()))
}

async fn run<P: PagePublisher>(
    publisher: &P,
    targets: &[(usize, &Value)],
    options: &PublishOptions,
    retry: Option<RetryPolicy>,
) -> Vec<Reject> {
    let bar = progress::count_bar(targets.len() as u64, "publishing", options.progress);
    let mut rejects = Vec::new();

    for (n, (index, row)) in targets.iter().enumerate() {
        if n > 0 {
            tokio::time::sleep(options.delay).await;
        }

        let outcome = match retry {
            Some(policy) => with_retry(policy, || publisher.create_page(row)).await,
            None => publisher.create_page(row).await,
        };
        if let Err(e) = outcome {
            warn!(index = index + 1, error = %e, "Publish failed");
            rejects.push(Reject::new(*index, row, &e));
        }
        bar.inc(1);
    }

    bar.finish_and_clear();
    rejects
}

fn finish<S: ArtifactStore>(
    store: &S,
    attempted: usize,
    rejects: Vec<Reject>,
    reject_name: &str,
) -> Result<PublishSummary, ArtifactError> {
    let published = attempted - rejects.len();
    let reject_file = if rejects.is_empty() {
        None
    } else {
        let path = store.save(reject_name, &rejects)?;
        warn!(failed = rejects.len(), path = %path.display(), "Wrote reject list");
        Some(path)
    };
    info!(published, failed = rejects.len(), "Publish complete");

    Ok(PublishSummary {
        published,
        rejects,
        reject_file,
    })
}

/// The most recently modified reject list in `dir`.
///
/// # Errors
///
/// Returns `ArtifactError::Io` if the directory cannot be listed.
pub fn latest_reject_file(dir: &Path) -> Result<Option<PathBuf>, ArtifactError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ArtifactError::io(dir, e)),
    };

    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| ArtifactError::io(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !(name.starts_with(REJECT_PREFIX) && name.ends_with(".json")) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| ArtifactError::io(entry.path(), e))?;
        if latest.as_ref().is_none_or(|(newest, _)| modified > *newest) {
            latest = Some((modified, entry.path()));
        }
    }
    Ok(latest.map(|(_, path)| path))
}
