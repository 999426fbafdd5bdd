//! Bulk export command.
//!
//! Jobs run strictly one after another: a store has a single current bulk
//! operation, and a failed job stops the run.

use std::time::Duration;

use tracing::info;

use product_porter_pipeline::bulk::{PollOptions, format_duration};
use product_porter_pipeline::download::LinePolicy;
use product_porter_pipeline::exports::{ExportJob, ExportOptions, run_export};
use product_porter_pipeline::shopify::AdminClient;
use product_porter_pipeline::{FsArtifactStore, PorterConfig};

/// Run `jobs` in order.
///
/// # Errors
///
/// Returns an error if Shopify is not configured or any job fails.
pub async fn run(
    config: &PorterConfig,
    jobs: &[ExportJob],
    skip_malformed: bool,
    timeout_secs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = AdminClient::new(config.shopify()?)?;
    let http = reqwest::Client::new();
    let store = FsArtifactStore::new(&config.output_dir);
    store.ensure_dir()?;

    let options = ExportOptions {
        poll: PollOptions {
            interval: config.poll_interval,
            timeout: timeout_secs.map(Duration::from_secs),
        },
        line_policy: if skip_malformed {
            LinePolicy::SkipMalformed
        } else {
            LinePolicy::Strict
        },
    };

    info!(store = %client.store(), jobs = jobs.len(), "Starting exports");
    for job in jobs {
        let report = run_export(&client, &http, &store, job, &options).await?;
        info!(
            job = %job.name,
            objects = report.operation.object_count,
            records = report.artifacts.record_count,
            products = ?report.artifacts.product_count,
            elapsed = %format_duration(report.operation.elapsed),
            "Export complete"
        );
    }
    Ok(())
}
