//! Result stream download, JSONL conversion and product narrowing.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};
use url::Url;

use product_porter_core::{ExportRecord, RecordKind};

use crate::artifact::{ArtifactError, ArtifactStore, FsArtifactStore};

/// What to do with a line that does not decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinePolicy {
    /// Abort the conversion at the first malformed line.
    #[default]
    Strict,
    /// Log a warning and drop the line.
    SkipMalformed,
}

/// Stream the body at `url` into `path`, returning the number of bytes written.
///
/// Result URLs are signed, so only the host is logged.
///
/// # Errors
///
/// Returns `ArtifactError::InvalidUrl` for an unparseable URL,
/// `ArtifactError::Download` on network failures or a non-success status,
/// and `ArtifactError::Io` if the file cannot be written.
#[instrument(skip(client, url), fields(path = %path.display()))]
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
) -> Result<u64, ArtifactError> {
    let url = Url::parse(url)?;
    info!(host = url.host_str().unwrap_or_default(), "Starting download");

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ArtifactError::io(parent, e))?;
    }

    let response = client.get(url).send().await?.error_for_status()?;
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ArtifactError::io(path, e))?;

    let mut written = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| ArtifactError::io(path, e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| ArtifactError::io(path, e))?;

    info!(bytes = written, "Download complete");
    Ok(written)
}

/// Decode a JSONL file, one record per non-blank line.
///
/// # Errors
///
/// Returns `ArtifactError::Io` if the file cannot be read, and
/// `ArtifactError::MalformedLine` under [`LinePolicy::Strict`].
pub fn convert(path: &Path, policy: LinePolicy) -> Result<Vec<ExportRecord>, ArtifactError> {
    let file = File::open(path).map_err(|e| ArtifactError::io(path, e))?;
    parse_lines(BufReader::new(file), path, policy)
}

/// Decode JSONL from any reader; `path` is used for error reporting only.
///
/// # Errors
///
/// See [`convert`].
pub fn parse_lines<R: BufRead>(
    reader: R,
    path: &Path,
    policy: LinePolicy,
) -> Result<Vec<ExportRecord>, ArtifactError> {
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ArtifactError::io(path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<ExportRecord>(trimmed) {
            Ok(record) => records.push(record),
            Err(source) => match policy {
                LinePolicy::Strict => {
                    return Err(ArtifactError::MalformedLine {
                        path: path.to_path_buf(),
                        line: index + 1,
                        source,
                    });
                }
                LinePolicy::SkipMalformed => {
                    warn!(path = %path.display(), line = index + 1, error = %source, "Skipping malformed record");
                    skipped += 1;
                }
            },
        }
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, "Conversion dropped malformed records");
    }
    Ok(records)
}

/// A structurally top-level product: product id and no parent.
#[must_use]
pub fn is_top_level_product(record: &ExportRecord) -> bool {
    record.kind() == RecordKind::Product && record.is_top_level()
}

/// Records matching `predicate`, in input order.
#[must_use]
pub fn narrow<P>(records: &[ExportRecord], predicate: P) -> Vec<ExportRecord>
where
    P: Fn(&ExportRecord) -> bool,
{
    records.iter().filter(|r| predicate(r)).cloned().collect()
}

/// Paths written by [`export_artifacts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifacts {
    pub records: PathBuf,
    pub products_only: Option<PathBuf>,
    pub record_count: usize,
    pub product_count: Option<usize>,
}

/// Write `<name>.json`, and `<name>.products_only.json` when requested.
///
/// # Errors
///
/// Returns an error if either artifact cannot be written.
pub fn export_artifacts(
    store: &FsArtifactStore,
    name: &str,
    records: &[ExportRecord],
    products_only: bool,
) -> Result<ExportArtifacts, ArtifactError> {
    let path = store.save(&format!("{name}.json"), &records)?;
    info!(artifact = %path.display(), records = records.len(), "Wrote export");

    let mut artifacts = ExportArtifacts {
        records: path,
        products_only: None,
        record_count: records.len(),
        product_count: None,
    };

    if products_only {
        let products = narrow(records, is_top_level_product);
        let path = store.save(&format!("{name}.products_only.json"), &products)?;
        info!(artifact = %path.display(), products = products.len(), "Wrote products-only export");
        artifacts.products_only = Some(path);
        artifacts.product_count = Some(products.len());
    }

    Ok(artifacts)
}

/// Narrow an existing `.json` export next to itself as `<stem>.products_only.json`.
///
/// Returns the output path and the number of products kept.
///
/// # Errors
///
/// Returns an error if the input is missing or unparseable, or the output
/// cannot be written.
pub fn narrow_file(input: &Path) -> Result<(PathBuf, usize), ArtifactError> {
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let store = FsArtifactStore::new(dir);

    let records: Vec<ExportRecord> = store.try_load(&name)?.ok_or_else(|| {
        ArtifactError::io(
            input,
            std::io::Error::new(std::io::ErrorKind::NotFound, "export not found"),
        )
    })?;

    let stem = name
        .strip_suffix(".json")
        .or_else(|| name.strip_suffix(".JSON"))
        .unwrap_or(&name);
    let products = narrow(&records, is_top_level_product);
    let path = store.save(&format!("{stem}.products_only.json"), &products)?;

    info!(artifact = %path.display(), products = products.len(), "Narrowed export");
    Ok((path, products.len()))
}
