//! Strategy configuration loading
//!
//! Loads configuration from `~/.config/imagestream/strategy.toml` (or the
//! `IMAGESTREAM_STRATEGY_CONFIG` env var). Every field has a default so an
//! absent file yields a usable configuration.

use crate::errors::{Result, StrategyError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration for the image stream strategy
#[derive(Debug, Deserialize, Clone)]
pub struct StrategyConfig {
    /// Registry host (host or host:port) used to build `status.dockerImageRepository`
    #[serde(default)]
    pub default_registry: Option<String>,

    /// Namespace assumed for streams that have none
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// Authorization check settings
    #[serde(default)]
    pub access: AccessConfig,
}

fn default_namespace() -> String {
    imagestream_api::NAMESPACE_DEFAULT.to_string()
}

/// Attributes of the access review issued for cross-namespace tags
#[derive(Debug, Deserialize, Clone)]
pub struct AccessConfig {
    /// Resource type checked on the target namespace
    #[serde(default = "default_resource")]
    pub resource: String,

    /// Verb checked on the target stream
    #[serde(default = "default_verb")]
    pub verb: String,
}

fn default_resource() -> String {
    "imagestreams".to_string()
}

fn default_verb() -> String {
    "get".to_string()
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            resource: default_resource(),
            verb: default_verb(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            default_registry: None,
            default_namespace: default_namespace(),
            access: AccessConfig::default(),
        }
    }
}

impl StrategyConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "IMAGESTREAM_STRATEGY_CONFIG";

    /// Default config filename
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "strategy.toml";

    /// Load configuration from file
    ///
    /// Resolution order:
    /// 1. `IMAGESTREAM_STRATEGY_CONFIG` environment variable
    /// 2. `~/.config/imagestream/strategy.toml`
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let path = Self::resolve_config_path();

        if !path.exists() {
            tracing::info!(
                path = %path.display(),
                "Strategy config not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StrategyError::config_with_source(
                format!("failed to read config at {}", path.display()),
                e,
            )
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: StrategyConfig = toml::from_str(contents)
            .map_err(|e| StrategyError::config_with_source("failed to parse config", e))?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .map(|h| {
                h.join(".config")
                    .join("imagestream")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    fn validate(&self) -> Result<()> {
        if self.default_namespace.is_empty() {
            return Err(StrategyError::config("default_namespace must not be empty"));
        }

        if self.access.verb.is_empty() || self.access.resource.is_empty() {
            return Err(StrategyError::config(
                "access.verb and access.resource must not be empty",
            ));
        }

        if self
            .default_registry
            .as_deref()
            .is_some_and(|r| r.trim().is_empty())
        {
            tracing::warn!(
                "default_registry is set but empty; status.dockerImageRepository will fall back to spec"
            );
        }

        Ok(())
    }
}
