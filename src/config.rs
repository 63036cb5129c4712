//! Configuration Management
//!
//! Settings come from a JSON file under the user config directory, overridden
//! by environment variables and then by command-line flags.

use crate::docs::publisher::{PublishSettings, DEFAULT_PREFIX};
use crate::docs::MAX_LINK_TTL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DOCS_BUCKET_ENV: &str = "APPINV_DOCS_BUCKET";
pub const SIGNER_ENV: &str = "APPINV_SIGNER";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Project to inventory
    #[serde(default)]
    pub project_id: Option<String>,
    /// Bucket receiving published documentation
    #[serde(default)]
    pub docs_bucket: Option<String>,
    /// Object key prefix for published documentation
    #[serde(default)]
    pub docs_prefix: Option<String>,
    /// Validity of published links, in seconds
    #[serde(default)]
    pub link_ttl_secs: Option<u64>,
    /// Service account that signs published links
    #[serde(default)]
    pub signer_service_account: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("appinv").join("config.json"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a file; a missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Apply `APPINV_*` overrides from the process environment
    pub fn with_env(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply `APPINV_*` overrides from any variable lookup
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(bucket) = non_empty(DOCS_BUCKET_ENV) {
            self.docs_bucket = Some(bucket);
        }
        if let Some(signer) = non_empty(SIGNER_ENV) {
            self.signer_service_account = Some(signer);
        }
        self
    }

    /// Get effective project (CLI > config > gcloud default)
    pub fn effective_project(&self, cli: Option<&str>) -> Option<String> {
        cli.map(|p| p.to_string())
            .or_else(|| self.project_id.clone())
            .or_else(crate::gcp::auth::get_default_project)
            .filter(|p| !p.trim().is_empty())
    }

    /// Link validity, clamped to the signed URL maximum
    pub fn link_ttl(&self) -> Duration {
        self.link_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(MAX_LINK_TTL)
            .min(MAX_LINK_TTL)
    }

    pub fn publish_settings(&self) -> PublishSettings {
        PublishSettings {
            bucket: self.docs_bucket.clone(),
            prefix: self
                .docs_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            link_ttl: self.link_ttl(),
        }
    }
}
