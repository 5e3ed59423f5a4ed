//! Configuration Management
//!
//! Handles persistent configuration storage for apicache.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_ROOT: &str = "https://api.linode.com/v4";
pub const TOKEN_ENV: &str = "APICACHE_TOKEN";
pub const API_ROOT_ENV: &str = "APICACHE_API_ROOT";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// API base URL
    #[serde(default)]
    pub api_root: Option<String>,
    /// Personal access token
    #[serde(default)]
    pub token: Option<String>,
    /// Last resource listed from the CLI
    #[serde(default)]
    pub last_resource: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("apicache").join("config.json"))
    }

    /// Load configuration from disk, falling back to defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Get effective API root (CLI > env > config > default)
    pub fn effective_api_root(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| std::env::var(API_ROOT_ENV).ok())
            .or_else(|| self.api_root.clone())
            .unwrap_or_else(|| DEFAULT_API_ROOT.to_string())
    }

    /// Get effective token (CLI > env > config)
    pub fn effective_token(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .or_else(|| self.token.clone())
            .filter(|t| !t.is_empty())
    }

    /// Remember the last listed resource and save
    pub fn set_last_resource(&mut self, resource: &str) -> Result<()> {
        self.last_resource = Some(resource.to_string());
        self.save()
    }
}
