//! Site configuration.
//!
//! Settings are plain strings looked up by name. A document can override any
//! setting through a front matter field of the same name.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use mdserve_mdx::FrontMatter;

use crate::source::SiteIdentity;

/// Setting that enables the render cache (`"1"` = on).
pub const USE_CACHING: &str = "UseMDCaching";
/// Setting that enables emoji substitution (anything but `"0"` = on).
pub const USE_EMOJI: &str = "UseEmoji";
/// Setting that allows downloading the Markdown source (`"1"` = on).
pub const ALLOW_DOWNLOADING: &str = "allowDownloading";
/// Setting naming the layout template, relative to the document root.
pub const TEMPLATE_NAME: &str = "TemplateName";

/// Source of string settings.
pub trait ConfigProvider: Send + Sync {
    /// Look up `name`, letting `front_matter` override the site-wide value.
    fn value(&self, name: &str, front_matter: Option<&FrontMatter>) -> Option<String>;

    /// Look up `name`, falling back to `default`.
    fn value_or(&self, name: &str, front_matter: Option<&FrontMatter>, default: &str) -> String {
        self.value(name, front_matter)
            .unwrap_or_else(|| default.to_string())
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

/// Configuration file structure (mdserve.toml).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    site: SiteSection,
    #[serde(default)]
    settings: HashMap<String, toml::Value>,
}

#[derive(Debug, Deserialize)]
struct SiteSection {
    #[serde(default = "default_root")]
    root: String,
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default = "default_remote_marker")]
    remote_marker: String,
    #[serde(default = "default_remote_prefix")]
    remote_prefix: String,
    #[serde(default)]
    remote_sites: Vec<String>,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            base_url: default_base_url(),
            remote_marker: default_remote_marker(),
            remote_prefix: default_remote_prefix(),
            remote_sites: Vec::new(),
        }
    }
}

fn default_root() -> String {
    "site".to_string()
}
fn default_base_url() -> String {
    "/".to_string()
}
fn default_remote_marker() -> String {
    "x-remote-timestamp".to_string()
}
fn default_remote_prefix() -> String {
    "/_content".to_string()
}

/// Loaded site configuration.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Directory holding the documents
    pub root: PathBuf,

    /// URL that `~/` virtual paths resolve to
    pub base_url: String,

    /// Request header whose presence enables the remote content fallback
    pub remote_marker: String,

    /// Path prefix under which the remote site serves raw documents
    pub remote_prefix: String,

    /// Sites the remote fallback may fetch from; empty disables it
    pub remote_sites: Vec<SiteIdentity>,

    /// Settings by lowercased name
    settings: HashMap<String, String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::from_file(ConfigFile::default(), Vec::new())
    }
}

impl SiteConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(source: &str, origin: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(source).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;

        let remote_sites = file
            .site
            .remote_sites
            .iter()
            .map(|url| {
                SiteIdentity::from_url(url).ok_or_else(|| ConfigError::Parse {
                    path: origin.to_string(),
                    message: format!("invalid remote site URL: {url}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_file(file, remote_sites))
    }

    /// Load configuration from `path`.
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_toml_str(&content, &path.display().to_string())?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Set a site-wide setting.
    pub fn with_setting(mut self, name: &str, value: impl Into<String>) -> Self {
        self.settings.insert(name.to_lowercase(), value.into());
        self
    }

    /// Allow the remote fallback to fetch from `site`.
    pub fn with_remote_site(mut self, site: SiteIdentity) -> Self {
        self.remote_sites.push(site);
        self
    }

    /// Replace the document root.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    fn from_file(file: ConfigFile, remote_sites: Vec<SiteIdentity>) -> Self {
        let settings = file
            .settings
            .into_iter()
            .filter_map(|(name, value)| Some((name.to_lowercase(), setting_to_string(value)?)))
            .collect();

        Self {
            root: PathBuf::from(file.site.root),
            base_url: file.site.base_url,
            remote_marker: file.site.remote_marker.to_lowercase(),
            remote_prefix: file.site.remote_prefix,
            remote_sites,
            settings,
        }
    }
}

impl ConfigProvider for SiteConfig {
    fn value(&self, name: &str, front_matter: Option<&FrontMatter>) -> Option<String> {
        front_matter
            .and_then(|fm| fm.get_non_empty(name))
            .map(str::to_string)
            .or_else(|| self.settings.get(&name.to_lowercase()).cloned())
    }
}

/// Settings are strings; numbers and booleans are accepted for convenience.
fn setting_to_string(value: toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Boolean(b) => Some(if b { "1" } else { "0" }.to_string()),
        other => {
            tracing::warn!("Ignoring non-scalar setting value: {}", other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_file() {
        let config = SiteConfig::from_toml_str(
            r#"
[site]
root = "pages"
base_url = "/docs/"
remote_sites = ["https://cms.example", "http://intranet:8080/"]

[settings]
UseMDCaching = "0"
UseEmoji = 0
allowDownloading = true
"#,
            "mdserve.toml",
        )
        .unwrap();

        assert_eq!(config.root, PathBuf::from("pages"));
        assert_eq!(config.base_url, "/docs/");
        assert_eq!(config.remote_marker, "x-remote-timestamp");
        assert_eq!(
            config.remote_sites,
            vec![
                SiteIdentity::new("https", "cms.example:443"),
                SiteIdentity::new("http", "intranet:8080"),
            ]
        );
        assert_eq!(config.value(USE_CACHING, None).as_deref(), Some("0"));
        assert_eq!(config.value(USE_EMOJI, None).as_deref(), Some("0"));
        assert_eq!(config.value(ALLOW_DOWNLOADING, None).as_deref(), Some("1"));
    }

    #[test]
    fn rejects_malformed_config() {
        let result = SiteConfig::from_toml_str("[site\nroot = ", "broken.toml");

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn rejects_invalid_remote_site() {
        let result = SiteConfig::from_toml_str(
            "[site]\nremote_sites = [\"cms.example\"]\n",
            "mdserve.toml",
        );

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = SiteConfig::load(Path::new("/definitely/not/here/mdserve.toml")).unwrap();

        assert_eq!(config.root, PathBuf::from("site"));
        assert!(config.remote_sites.is_empty());
        assert_eq!(config.value(USE_CACHING, None), None);
    }

    #[test]
    fn front_matter_overrides_settings() {
        let config = SiteConfig::default().with_setting(USE_EMOJI, "1");
        let fm = FrontMatter::parse_block("useemoji: 0");

        assert_eq!(config.value_or(USE_EMOJI, Some(&fm), "1"), "0");
        assert_eq!(config.value_or(USE_EMOJI, None, "0"), "1");
        assert_eq!(config.value_or("Missing", Some(&fm), "fallback"), "fallback");
    }

    #[test]
    fn empty_front_matter_value_does_not_override() {
        let config = SiteConfig::default().with_setting(TEMPLATE_NAME, "layout.html");
        let fm = FrontMatter::parse_block("TemplateName:");

        assert_eq!(
            config.value(TEMPLATE_NAME, Some(&fm)).as_deref(),
            Some("layout.html")
        );
    }
}
