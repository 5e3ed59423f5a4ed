//! Cache slice and entity record types
//!
//! These are the read-only views callers get from the store. Only the
//! reducer in [`super::reducer`] builds new values of them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Scope key for request-level errors that do not name a field
pub const GLOBAL_SCOPE: &str = "_";

/// Keys an [`EntityRecord`] serializes next to its attributes; server fields
/// with these names are not merged.
pub const RESERVED_FIELDS: &[&str] = &["requestStatus", "nestedCaches"];

/// Identifier of a cached entity.
///
/// Numeric ids coming from the API are kept as their decimal string so that
/// `5` and `"5"` address the same record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an id out of a JSON value (string or integer)
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for EntityId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<u32> for EntityId {
    fn from(n: u32) -> Self {
        Self(n.to_string())
    }
}

impl From<i32> for EntityId {
    fn from(n: i32) -> Self {
        Self(n.to_string())
    }
}

/// Fetch status of an entity or of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[default]
    Unfetched,
    Fetching,
    Fetched,
    Error,
}

impl RequestStatus {
    /// A new request always moves to `Fetching`, whatever came before.
    pub fn begin(self) -> Self {
        Self::Fetching
    }

    pub fn succeed(self) -> Self {
        Self::Fetched
    }

    pub fn fail(self) -> Self {
        Self::Error
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Fetching)
    }
}

/// One error entry as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            field: None,
        }
    }

    pub fn for_field(reason: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            field: Some(field.into()),
        }
    }

    /// Scope this error is filed under: its field, or `_`
    pub fn scope(&self) -> &str {
        self.field.as_deref().unwrap_or(GLOBAL_SCOPE)
    }
}

/// Errors keyed by scope (`_` or a field name)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorMap(BTreeMap<String, Vec<ErrorDetail>>);

impl ErrorMap {
    /// Group error entries by scope, keeping their order within a scope
    pub fn from_details(details: impl IntoIterator<Item = ErrorDetail>) -> Self {
        let mut map: BTreeMap<String, Vec<ErrorDetail>> = BTreeMap::new();
        for detail in details {
            map.entry(detail.scope().to_string())
                .or_default()
                .push(detail);
        }
        Self(map)
    }

    pub fn scope(&self, scope: &str) -> Option<&[ErrorDetail]> {
        self.0.get(scope).map(Vec::as_slice)
    }

    pub fn global(&self) -> Option<&[ErrorDetail]> {
        self.scope(GLOBAL_SCOPE)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Overwrite every scope present in `other`; scopes it does not mention
    /// are left alone.
    pub(crate) fn replace_scopes(&mut self, other: &ErrorMap) {
        for (scope, details) in &other.0 {
            self.0.insert(scope.clone(), details.clone());
        }
    }

    pub(crate) fn remove_scope(&mut self, scope: &str) {
        self.0.remove(scope);
    }
}

/// Operation that last wrote an error scope. A success only clears the
/// field scopes its own kind of operation wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ErrorOwner {
    Entity(EntityId),
    Listing,
    Create,
}

/// One cached object of a resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    #[serde(skip)]
    pub(crate) id: EntityId,
    #[serde(flatten)]
    pub(crate) attributes: Map<String, Value>,
    pub(crate) request_status: RequestStatus,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) nested_caches: BTreeMap<String, CacheSlice>,
}

impl EntityRecord {
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            attributes: Map::new(),
            request_status: RequestStatus::Unfetched,
            nested_caches: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    pub fn request_status(&self) -> RequestStatus {
        self.request_status
    }

    /// Nested cache for a sub-resource, by its plural name
    pub fn nested(&self, plural: &str) -> Option<&CacheSlice> {
        self.nested_caches.get(plural)
    }

    pub fn nested_caches(&self) -> &BTreeMap<String, CacheSlice> {
        &self.nested_caches
    }

    /// Server fields overwrite local ones, absent fields stay as they are.
    /// Nested caches are never part of a merge, and fields named like the
    /// record's own keys ([`RESERVED_FIELDS`]) are dropped.
    pub(crate) fn merge_attributes(&mut self, incoming: &Map<String, Value>) {
        for (field, value) in incoming {
            if RESERVED_FIELDS.contains(&field.as_str()) {
                tracing::warn!("entity {}: dropping reserved field `{}`", self.id, field);
                continue;
            }
            self.attributes.insert(field.clone(), value.clone());
        }
    }
}

/// Normalized, paginated cache for one resource (possibly nested)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSlice {
    pub(crate) entities_by_id: BTreeMap<EntityId, EntityRecord>,
    pub(crate) pages_fetched: BTreeSet<u32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) page_members: BTreeMap<u32, Vec<EntityId>>,
    pub(crate) total_pages: Option<u32>,
    pub(crate) total_results: Option<u64>,
    pub(crate) list_request_status: RequestStatus,
    pub(crate) errors: ErrorMap,
    #[serde(skip)]
    pub(crate) error_owners: BTreeMap<String, ErrorOwner>,
}

impl CacheSlice {
    pub fn entities(&self) -> &BTreeMap<EntityId, EntityRecord> {
        &self.entities_by_id
    }

    pub fn entity(&self, id: &EntityId) -> Option<&EntityRecord> {
        self.entities_by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities_by_id.is_empty()
    }

    pub fn pages_fetched(&self) -> &BTreeSet<u32> {
        &self.pages_fetched
    }

    /// Ids returned by the last fetch of `page`, minus deleted ones
    pub fn page_members(&self, page: u32) -> Option<&[EntityId]> {
        self.page_members.get(&page).map(Vec::as_slice)
    }

    /// Records of a fetched page, in the order the server returned them
    pub fn page(&self, page: u32) -> Vec<&EntityRecord> {
        self.page_members(page)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.entities_by_id.get(id))
            .collect()
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    pub fn total_results(&self) -> Option<u64> {
        self.total_results
    }

    pub fn list_request_status(&self) -> RequestStatus {
        self.list_request_status
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    /// Overwrite the scopes `errors` names and remember who wrote them
    pub(crate) fn record_errors(&mut self, errors: &ErrorMap, owner: ErrorOwner) {
        self.errors.replace_scopes(errors);
        for scope in errors.scopes() {
            self.error_owners.insert(scope.to_string(), owner.clone());
        }
    }

    /// Drop `_` and every field scope `owner` wrote
    pub(crate) fn clear_errors(&mut self, owner: &ErrorOwner) {
        let owned: Vec<String> = self
            .error_owners
            .iter()
            .filter(|(scope, by)| scope.as_str() == GLOBAL_SCOPE || *by == owner)
            .map(|(scope, _)| scope.clone())
            .collect();
        for scope in owned {
            self.errors.remove_scope(&scope);
            self.error_owners.remove(&scope);
        }
    }
}
