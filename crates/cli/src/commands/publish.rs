//! Notion publish and resume commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use product_porter_pipeline::publish::{
    self as pages, NotionClient, PublishOptions, PublishSummary, ROWS_ARTIFACT, Reject,
    latest_reject_file,
};
use product_porter_pipeline::{ArtifactStore, FsArtifactStore, PorterConfig};

/// Publish every row.
///
/// # Errors
///
/// Returns an error if Notion is not configured, the rows cannot be loaded,
/// or the reject list cannot be written. Failed rows are not errors.
pub async fn publish(
    config: &PorterConfig,
    rows: Option<PathBuf>,
    delay_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = NotionClient::new(config.notion()?)?;
    let store = FsArtifactStore::new(&config.output_dir);
    let rows: Vec<Value> = load(&rows.unwrap_or_else(|| store.path(ROWS_ARTIFACT)))?;

    let options = options(config, delay_ms, None);
    info!(rows = rows.len(), database = %client.database_id(), "Publishing rows");
    let summary = pages::publish_all(&client, &store, &rows, &options, today()).await?;
    report(&summary);
    Ok(())
}

/// Retry the rows named by a reject list.
///
/// # Errors
///
/// Returns an error if Notion is not configured, no reject list is found,
/// or the rows or reject list cannot be loaded.
pub async fn resume(
    config: &PorterConfig,
    fail: Option<PathBuf>,
    rows: Option<PathBuf>,
    delay_ms: Option<u64>,
    retries: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = NotionClient::new(config.notion()?)?;
    let store = FsArtifactStore::new(&config.output_dir);

    let fail = match fail {
        Some(path) => path,
        None => latest_reject_file(store.dir())?.ok_or("No notion_upload_fail_*.json found")?,
    };
    let rows: Vec<Value> = load(&rows.unwrap_or_else(|| store.path(ROWS_ARTIFACT)))?;
    let rejects: Vec<Reject> = load(&fail)?;

    info!(reject_list = %fail.display(), rejects = rejects.len(), "Resuming");
    let options = options(config, delay_ms, retries);
    let summary = pages::resume(&client, &store, &rows, &rejects, &options, today()).await?;
    report(&summary);
    Ok(())
}

fn options(config: &PorterConfig, delay_ms: Option<u64>, retries: Option<u32>) -> PublishOptions {
    let mut options = PublishOptions {
        delay: config.publish.delay,
        retry: config.publish.retry,
        progress: true,
    };
    if let Some(ms) = delay_ms {
        options.delay = Duration::from_millis(ms);
    }
    if let Some(retries) = retries {
        options.retry.retries = retries;
    }
    options
}

fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}

fn load<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Invalid path: {}", path.display()))?;
    FsArtifactStore::new(dir)
        .try_load(name)?
        .ok_or_else(|| format!("File not found: {}", path.display()).into())
}

fn report(summary: &PublishSummary) {
    match &summary.reject_file {
        Some(path) => info!(
            published = summary.published,
            failed = summary.rejects.len(),
            reject_list = %path.display(),
            "Finished with failures"
        ),
        None => info!(published = summary.published, "Finished"),
    }
}
