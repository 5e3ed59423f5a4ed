//! Resource Config
//!
//! Declarative description of one REST resource, validated once by
//! [`configure`]. Everything downstream (actions, reducers, the store)
//! trusts a [`ResourceConfig`] to be well formed.

use super::endpoint::EndpointTemplate;
use crate::cache::{EntityId, SliceAddress};
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Operation shapes a resource may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupportedOp {
    /// fetch-one, update, delete and entity actions
    Single,
    /// fetch-page and create
    Collection,
}

impl fmt::Display for SupportedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("SINGLE"),
            Self::Collection => f.write_str("COLLECTION"),
        }
    }
}

/// Fixed set over [`SupportedOp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpSet {
    single: bool,
    collection: bool,
}

impl OpSet {
    pub fn contains(&self, op: SupportedOp) -> bool {
        match op {
            SupportedOp::Single => self.single,
            SupportedOp::Collection => self.collection,
        }
    }

    pub fn insert(&mut self, op: SupportedOp) {
        match op {
            SupportedOp::Single => self.single = true,
            SupportedOp::Collection => self.collection = true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.single && !self.collection
    }
}

impl FromIterator<SupportedOp> for OpSet {
    fn from_iter<I: IntoIterator<Item = SupportedOp>>(iter: I) -> Self {
        let mut set = Self::default();
        for op in iter {
            set.insert(op);
        }
        set
    }
}

/// A named entity action such as `backups/enable`, POSTed under the
/// entity's path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAction {
    pub name: String,
    pub path: String,
}

/// Unvalidated input to [`configure`]
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    pub name: Option<String>,
    pub plural_name: Option<String>,
    pub endpoint: Option<EndpointTemplate>,
    pub supported_ops: Vec<SupportedOp>,
    /// Field holding the entity id in API payloads (default `id`)
    pub id_field: Option<String>,
    /// Dot path to the entity list in page responses (default: plural name)
    pub response_path: Option<String>,
    pub sub_resources: Vec<ResourceConfig>,
    pub actions: Vec<EntityAction>,
}

impl ResourceOptions {
    pub fn new(name: &str, plural_name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            plural_name: Some(plural_name.to_string()),
            ..Self::default()
        }
    }

    pub fn endpoint(mut self, endpoint: EndpointTemplate) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn supports(mut self, ops: &[SupportedOp]) -> Self {
        self.supported_ops.extend_from_slice(ops);
        self
    }

    pub fn id_field(mut self, field: &str) -> Self {
        self.id_field = Some(field.to_string());
        self
    }

    pub fn response_path(mut self, path: &str) -> Self {
        self.response_path = Some(path.to_string());
        self
    }

    pub fn sub_resource(mut self, config: ResourceConfig) -> Self {
        self.sub_resources.push(config);
        self
    }

    pub fn action(mut self, name: &str, path: &str) -> Self {
        self.actions.push(EntityAction {
            name: name.to_string(),
            path: path.to_string(),
        });
        self
    }
}

/// Validated resource description
#[derive(Debug, Clone)]
pub struct ResourceConfig {
    name: String,
    plural_name: String,
    endpoint: EndpointTemplate,
    supported_ops: OpSet,
    id_field: String,
    response_path: String,
    lineage: Vec<String>,
    sub_resources: BTreeMap<String, Arc<ResourceConfig>>,
    actions: BTreeMap<String, EntityAction>,
}

/// Validate options into a [`ResourceConfig`]
pub fn configure(options: ResourceOptions) -> Result<ResourceConfig, ConfigurationError> {
    let name = non_empty(options.name).ok_or(ConfigurationError::MissingField("name"))?;
    let plural_name =
        non_empty(options.plural_name).ok_or(ConfigurationError::MissingField("pluralName"))?;
    if name == plural_name {
        return Err(ConfigurationError::IndistinctNames(name));
    }
    let endpoint = options
        .endpoint
        .ok_or(ConfigurationError::MissingField("endpointTemplate"))?;
    let supported_ops: OpSet = options.supported_ops.into_iter().collect();
    if supported_ops.is_empty() {
        return Err(ConfigurationError::NoSupportedOps(plural_name));
    }

    let response_path = non_empty(options.response_path).unwrap_or_else(|| plural_name.clone());
    let mut config = ResourceConfig {
        name,
        plural_name,
        endpoint,
        supported_ops,
        id_field: non_empty(options.id_field).unwrap_or_else(|| "id".to_string()),
        response_path,
        lineage: Vec::new(),
        sub_resources: BTreeMap::new(),
        actions: options
            .actions
            .into_iter()
            .map(|a| (a.name.clone(), a))
            .collect(),
    };

    for child in options.sub_resources {
        let child_plural = child.plural_name.clone();
        if config.sub_resources.contains_key(&child_plural) {
            return Err(ConfigurationError::DuplicateSubResource {
                parent: config.plural_name.clone(),
                child: child_plural,
            });
        }
        let lineage = vec![config.plural_name.clone()];
        config
            .sub_resources
            .insert(child_plural, Arc::new(child.reparent(&lineage)?));
    }

    tracing::debug!(
        "configured resource {} ({} sub-resources)",
        config.plural_name,
        config.sub_resources.len()
    );
    Ok(config)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl ResourceConfig {
    /// Place this config (and its own children) under `parents`
    fn reparent(mut self, parents: &[String]) -> Result<Self, ConfigurationError> {
        self.lineage = parents.to_vec();
        let mut child_lineage = self.lineage.clone();
        child_lineage.push(self.plural_name.clone());

        let children = std::mem::take(&mut self.sub_resources);
        for (plural, child) in children {
            let child = Arc::unwrap_or_clone(child).reparent(&child_lineage)?;
            self.sub_resources.insert(plural, Arc::new(child));
        }
        Ok(self)
    }

    /// Check that this config can be used as the root of a state tree: it
    /// has no parents, and no template in the tree needs more ancestor ids
    /// than its nesting provides.
    pub fn validate_top_level(&self) -> Result<(), ConfigurationError> {
        if !self.is_top_level() {
            return Err(ConfigurationError::NotTopLevel(self.plural_name.clone()));
        }
        self.check_depth()
    }

    fn check_depth(&self) -> Result<(), ConfigurationError> {
        if let Some(index) = self.endpoint.max_ancestor() {
            if index >= self.depth() {
                return Err(ConfigurationError::AncestorOutOfRange {
                    resource: self.plural_name.clone(),
                    index,
                    depth: self.depth(),
                });
            }
        }
        self.sub_resources.values().try_for_each(|child| child.check_depth())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plural_name(&self) -> &str {
        &self.plural_name
    }

    pub fn endpoint(&self) -> &EndpointTemplate {
        &self.endpoint
    }

    pub fn supports(&self, op: SupportedOp) -> bool {
        self.supported_ops.contains(op)
    }

    pub fn supported_ops(&self) -> OpSet {
        self.supported_ops
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn response_path(&self) -> &str {
        &self.response_path
    }

    /// Plural names of the parent resources, top level first
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// Number of ancestor ids every operation on this resource needs
    pub fn depth(&self) -> usize {
        self.lineage.len()
    }

    pub fn is_top_level(&self) -> bool {
        self.lineage.is_empty()
    }

    /// Lineage followed by this resource's plural name
    pub fn path(&self) -> Vec<String> {
        let mut path = self.lineage.clone();
        path.push(self.plural_name.clone());
        path
    }

    pub fn sub_resource(&self, plural: &str) -> Option<&Arc<ResourceConfig>> {
        self.sub_resources.get(plural)
    }

    pub fn sub_resources(&self) -> impl Iterator<Item = &Arc<ResourceConfig>> {
        self.sub_resources.values()
    }

    /// Walk down the sub-resource tree by plural names
    pub fn descendant(&self, path: &[String]) -> Option<&ResourceConfig> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self.sub_resources.get(head)?.descendant(rest),
        }
    }

    pub fn action(&self, name: &str) -> Option<&EntityAction> {
        self.actions.get(name)
    }

    pub fn actions(&self) -> impl Iterator<Item = &EntityAction> {
        self.actions.values()
    }

    /// Address of this resource's slice for the given ancestors
    pub fn address(&self, ancestors: &[EntityId]) -> Result<SliceAddress, ConfigurationError> {
        SliceAddress::nested(self.path(), ancestors.to_vec()).ok_or_else(|| {
            ConfigurationError::AncestorCount {
                resource: self.plural_name.clone(),
                expected: self.depth(),
                actual: ancestors.len(),
            }
        })
    }

    pub fn entity_path(&self, id: &EntityId, ancestors: &[EntityId]) -> String {
        self.endpoint.entity_path(id, ancestors)
    }

    pub fn collection_path(&self, ancestors: &[EntityId]) -> String {
        self.endpoint.collection_path(ancestors)
    }
}
