//! Static site export command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mdserve_page::{Site, SiteExporter};

/// Run the build command.
pub async fn run(config_path: &Path, root: Option<PathBuf>, output: PathBuf) -> Result<()> {
    tracing::info!("Exporting site...");

    let config = super::load_config(config_path, root)?;

    let result = tokio::task::spawn_blocking(move || {
        let site = Site::new(config);
        SiteExporter::new(&site, output).export()
    })
    .await
    .context("Export task failed")??;

    tracing::info!(
        "Exported {} pages in {}ms",
        result.pages,
        result.duration_ms
    );
    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
