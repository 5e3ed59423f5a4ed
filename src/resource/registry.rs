//! Resource Registry - Load resource definitions from JSON
//!
//! Resource definitions for the Linode API are embedded JSON files turned
//! into validated [`ResourceConfig`]s on first access. New resources can be
//! added by editing the JSON, without code changes.

use super::config::{configure, EntityAction, ResourceConfig, ResourceOptions, SupportedOp};
use super::endpoint::EndpointTemplate;
use crate::error::ConfigurationError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/account.json"),
    include_str!("../resources/linode.json"),
    include_str!("../resources/networking.json"),
];

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
struct ResourceDef {
    name: String,
    endpoint: String,
    supports: Vec<SupportedOp>,
    #[serde(default)]
    id_field: Option<String>,
    #[serde(default)]
    response_path: Option<String>,
    #[serde(default)]
    actions: Vec<EntityAction>,
    #[serde(default)]
    sub_resources: BTreeMap<String, ResourceDef>,
}

impl ResourceDef {
    fn into_config(self, plural: &str) -> Result<ResourceConfig, ConfigurationError> {
        let mut options = ResourceOptions::new(&self.name, plural)
            .endpoint(EndpointTemplate::pattern(&self.endpoint)?)
            .supports(&self.supports);
        options.id_field = self.id_field;
        options.response_path = self.response_path;
        options.actions = self.actions;
        for (child_plural, child) in self.sub_resources {
            options.sub_resources.push(child.into_config(&child_plural)?);
        }
        configure(options)
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Deserialize)]
struct ResourceFile {
    #[serde(default)]
    resources: BTreeMap<String, ResourceDef>,
}

/// Validated top-level resources keyed by plural name
#[derive(Debug, Clone, Default)]
pub struct Registry {
    resources: BTreeMap<String, Arc<ResourceConfig>>,
}

impl Registry {
    /// Parse and validate a set of JSON definition files
    pub fn from_json_sources(sources: &[&str]) -> Result<Self, ConfigurationError> {
        let mut registry = Self::default();
        for content in sources {
            let file: ResourceFile = serde_json::from_str(content)
                .map_err(|e| ConfigurationError::Definitions(e.to_string()))?;
            for (plural, def) in file.resources {
                let config = def.into_config(&plural)?;
                config.validate_top_level()?;
                if registry.resources.contains_key(&plural) {
                    return Err(ConfigurationError::Definitions(format!(
                        "resource `{}` is defined twice",
                        plural
                    )));
                }
                registry.resources.insert(plural, Arc::new(config));
            }
        }
        Ok(registry)
    }

    /// Top-level resource by plural name
    pub fn get(&self, plural: &str) -> Option<&Arc<ResourceConfig>> {
        self.resources.get(plural)
    }

    /// Resolve `linodes` or `linodes/backups` style paths
    pub fn resolve(&self, path: &str) -> Option<&Arc<ResourceConfig>> {
        let mut parts = path.split('/').filter(|p| !p.is_empty());
        let mut current = self.resources.get(parts.next()?)?;
        for part in parts {
            current = current.sub_resource(part)?;
        }
        Some(current)
    }

    /// Plural names of all top-level resources (for autocomplete)
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResourceConfig>> {
        self.resources.values()
    }
}

/// Global registry loaded from the embedded JSON
static REGISTRY: OnceLock<Result<Registry, ConfigurationError>> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> Result<&'static Registry, ConfigurationError> {
    REGISTRY
        .get_or_init(|| Registry::from_json_sources(RESOURCE_FILES))
        .as_ref()
        .map_err(Clone::clone)
}

/// Get a resource definition by plural name or nested path
pub fn get_resource(path: &str) -> Option<Arc<ResourceConfig>> {
    get_registry().ok()?.resolve(path).cloned()
}
