//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/gunsmith.sqlite"
//!
//! [content]
//! dir = "./data/content"
//! locale = "en"
//!
//! [api]
//! base_url = "https://www.bungie.net/Platform"
//! api_key_env = "BUNGIE_API_KEY"
//!
//! [cache]
//! ttl_secs = 86400
//! invalidate_on_manifest = false
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub content: ContentConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    /// Directory holding the extracted locale content databases.
    pub dir: PathBuf,
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Host that serves the zipped content databases advertised by the manifest.
    #[serde(default = "default_content_base_url")]
    pub content_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// No timeout unless set; the transport default applies.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            content_base_url: default_content_base_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_secs: None,
        }
    }
}

fn default_base_url() -> String {
    "https://www.bungie.net/Platform".to_string()
}
fn default_content_base_url() -> String {
    "https://www.bungie.net".to_string()
}
fn default_api_key_env() -> String {
    "BUNGIE_API_KEY".to_string()
}

impl ApiConfig {
    /// Resolve the API key: the literal `api_key` wins, then the
    /// environment variable named by `api_key_env`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheConfig {
    /// Entries never expire when unset.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    /// Clear cached responses when sync records a new manifest.
    #[serde(default)]
    pub invalidate_on_manifest: bool,
    #[serde(default)]
    pub hit_delay_ms: u64,
}

impl Config {
    /// A config rooted at `root`, with the database and content directory
    /// underneath it and defaults everywhere else.
    pub fn minimal(root: &Path) -> Self {
        Self {
            db: DbConfig {
                path: root.join("gunsmith.sqlite"),
            },
            content: ContentConfig {
                dir: root.join("content"),
                locale: default_locale(),
            },
            api: ApiConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.content.locale.trim().is_empty() {
        anyhow::bail!("content.locale must not be empty");
    }

    if config.api.base_url.trim().is_empty() {
        anyhow::bail!("api.base_url must not be empty");
    }

    if config.api.content_base_url.trim().is_empty() {
        anyhow::bail!("api.content_base_url must not be empty");
    }

    if config.cache.ttl_secs == Some(0) {
        anyhow::bail!("cache.ttl_secs must be > 0 when set (omit it to never expire)");
    }

    Ok(())
}
