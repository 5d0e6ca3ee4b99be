//! hbload configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::plugin::{HbConfig, LoadMode, PluginConfig};

/// Main hbload configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Template source configuration
    pub fetch: FetchConfig,

    /// Build output configuration
    pub build: BuildConfig,

    /// Handlebars plugin options, shared with [`PluginConfig`]
    pub hb: HbConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.base_url.is_some() && self.fetch.root_dir.is_some() {
            return Err(eyre::eyre!(
                "Both base-url and root-dir are set. Pick one template source."
            ));
        }
        if let Some(url) = &self.fetch.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(eyre::eyre!(
                    "base-url must start with http:// or https://, got {}",
                    url
                ));
            }
        }
        if !crate::codegen::valid_plugin_name(&self.build.plugin_name) {
            return Err(eyre::eyre!("Invalid plugin name: {}", self.build.plugin_name));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .hbload.yml
        let local_config = PathBuf::from(".hbload.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/hbload/hbload.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("hbload").join("hbload.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Derive per-load plugin options for the given mode
    pub fn plugin_config(&self, mode: LoadMode) -> PluginConfig {
        PluginConfig {
            mode,
            hb: self.hb.clone(),
        }
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Template source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Base URL prepended to module names when fetching over HTTP
    #[serde(rename = "base-url")]
    pub base_url: Option<String>,

    /// Root directory for filesystem fetches
    #[serde(rename = "root-dir")]
    pub root_dir: Option<PathBuf>,

    /// HTTP request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            root_dir: None,
            timeout_ms: crate::DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

/// Build output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Plugin id prefixed to emitted module ids
    #[serde(rename = "plugin-name")]
    pub plugin_name: String,

    /// Bundle file for emitted modules. Unset writes to stdout.
    pub output: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            plugin_name: crate::DEFAULT_PLUGIN_NAME.to_string(),
            output: None,
        }
    }
}
