//! SitePulse configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SitePulseError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitePulseConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub sitemap: SitemapConfig,
}

impl Default for SitePulseConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            sitemap: SitemapConfig::default(),
        }
    }
}

impl SitePulseConfig {
    /// Load config from the default path (~/.sitepulse/config.toml).
    /// A missing file is not an error: defaults apply.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SitePulseError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SitePulseError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SitePulseError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the SitePulse home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sitepulse")
    }
}

/// Tick-loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between due-task checks.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

fn default_check_interval() -> u64 { 60 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
        }
    }
}

/// Sitemap submission configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Public site origin, e.g. "https://example.com".
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// Sitemap path under the site origin.
    #[serde(default = "default_sitemap_path")]
    pub sitemap_path: String,
    /// 5-field cron-style trigger for the submission task.
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default = "bool_true")]
    pub ping_google: bool,
    #[serde(default = "bool_true")]
    pub ping_bing: bool,
}

fn bool_true() -> bool { true }
fn default_site_url() -> String { "https://example.com".into() }
fn default_sitemap_path() -> String { "/sitemap.xml".into() }
fn default_schedule() -> String { "0 2 * * *".into() }

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            enabled: bool_true(),
            site_url: default_site_url(),
            sitemap_path: default_sitemap_path(),
            schedule: default_schedule(),
            ping_google: bool_true(),
            ping_bing: bool_true(),
        }
    }
}

impl SitemapConfig {
    /// Full sitemap URL (origin + path).
    pub fn sitemap_url(&self) -> String {
        format!(
            "{}{}",
            self.site_url.trim_end_matches('/'),
            self.sitemap_path
        )
    }
}
