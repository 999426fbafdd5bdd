//! Products-only narrowing of an existing export.

use std::path::PathBuf;

use tracing::info;

use product_porter_pipeline::PorterConfig;
use product_porter_pipeline::download::narrow_file;
use product_porter_pipeline::join::BASE_ARTIFACT;

/// Narrow `file`, or the base export when none is given.
///
/// # Errors
///
/// Returns an error if the export is missing or unparseable.
pub fn run(config: &PorterConfig, file: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let input = file.unwrap_or_else(|| config.output_dir.join(BASE_ARTIFACT));
    let (output, products) = narrow_file(&input)?;
    info!(products, output = %output.display(), "Products-only export written");
    Ok(())
}
