//! Metafield translation fetch command.

use std::time::Duration;

use tracing::{info, warn};

use product_porter_pipeline::retry::RetryPolicy;
use product_porter_pipeline::shopify::AdminClient;
use product_porter_pipeline::translate::{FetchOptions, fetch_metafield_translations};
use product_porter_pipeline::{FsArtifactStore, PorterConfig};

/// Fetch `locale` translations for the allow-listed metafields.
///
/// # Errors
///
/// Returns an error if Shopify is not configured or the metafields export
/// is missing. Failed batches are logged, not returned.
pub async fn run(
    config: &PorterConfig,
    locale: &str,
    delay_ms: Option<u64>,
    retry: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = AdminClient::new(config.shopify()?)?;
    let store = FsArtifactStore::new(&config.output_dir);

    let mut options = FetchOptions::new(locale, &config.translation);
    if let Some(ms) = delay_ms {
        options.delay = Duration::from_millis(ms);
    }
    if retry {
        options = options.with_retry(RetryPolicy::default());
    }

    let summary = fetch_metafield_translations(&client, &store, &options).await?;
    if summary.failed_batches > 0 {
        warn!(
            failed_batches = summary.failed_batches,
            "Some batches failed; their translations are missing"
        );
    }
    info!(
        requested = summary.requested,
        translated = summary.translated,
        output = %summary.output.display(),
        "Metafield translations written"
    );
    Ok(())
}
