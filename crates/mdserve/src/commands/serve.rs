//! Site server command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use mdserve_page::Site;
use mdserve_server::{MdServer, ServerConfig};

/// Run the serve command.
pub async fn run(
    config_path: &Path,
    root: Option<PathBuf>,
    host: String,
    port: u16,
    watch: bool,
) -> Result<()> {
    let config = super::load_config(config_path, root)?;
    if !config.root.is_dir() {
        anyhow::bail!("Document root not found: {}", config.root.display());
    }

    let server_config = ServerConfig {
        host,
        port,
        watch,
        remote_marker: config.remote_marker.clone(),
    };

    let site = Arc::new(Site::new(config));
    MdServer::new(server_config, site).start().await?;

    Ok(())
}
