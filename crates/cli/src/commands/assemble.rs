//! Assembly command.

use tracing::info;

use product_porter_pipeline::join::{JoinPlan, assemble};
use product_porter_pipeline::{FsArtifactStore, PorterConfig};

/// Run the default join plan over the output directory.
///
/// # Errors
///
/// Returns an error if the base export is missing or an artifact is invalid.
pub fn run(config: &PorterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = FsArtifactStore::new(&config.output_dir);
    let summary = assemble(&store, &JoinPlan::default())?;
    info!(
        entities = summary.entities,
        output = %summary.output.display(),
        "Consolidated products written"
    );
    Ok(())
}
