pub mod build;
pub mod serve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mdserve_page::SiteConfig;

/// Load the site configuration, letting `root` override the configured root.
fn load_config(config_path: &Path, root: Option<PathBuf>) -> Result<SiteConfig> {
    let config = SiteConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    Ok(match root {
        Some(root) => config.with_root(root),
        None => config,
    })
}
