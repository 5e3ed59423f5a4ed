//! Lifecycle events emitted by generated actions and consumed by reducers

use super::state::{EntityId, ErrorMap};
use serde_json::{Map, Value};
use std::fmt;

/// Where an event lands in the state tree.
///
/// `path` is the chain of plural names from the top-level resource down to
/// the target slice; `ancestors` holds one id per parent level, outermost
/// first, so `ancestors.len() == path.len() - 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceAddress {
    path: Vec<String>,
    ancestors: Vec<EntityId>,
}

impl SliceAddress {
    pub fn top_level(plural: impl Into<String>) -> Self {
        Self {
            path: vec![plural.into()],
            ancestors: Vec::new(),
        }
    }

    /// Build an address for a nested slice. Returns `None` when the number of
    /// ancestor ids does not match the depth of `path`.
    pub fn nested(path: Vec<String>, ancestors: Vec<EntityId>) -> Option<Self> {
        if path.is_empty() || ancestors.len() + 1 != path.len() {
            return None;
        }
        Some(Self { path, ancestors })
    }

    /// Plural name of the top-level resource owning the slice
    pub fn root(&self) -> &str {
        &self.path[0]
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn ancestors(&self) -> &[EntityId] {
        &self.ancestors
    }
}

impl fmt::Display for SliceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path[0])?;
        for (child, parent) in self.path[1..].iter().zip(&self.ancestors) {
            write!(f, "[{}].{}", parent, child)?;
        }
        Ok(())
    }
}

/// One page of a collection listing
#[derive(Debug, Clone, PartialEq)]
pub struct PagePayload {
    pub page: u32,
    pub entities: Vec<Map<String, Value>>,
    pub total_pages: u32,
    pub total_results: u64,
}

/// Payload of a lifecycle event
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    FetchOneBegin { id: EntityId },
    FetchOneSuccess { id: EntityId, entity: Map<String, Value> },
    FetchOneError { id: EntityId, errors: ErrorMap },
    FetchPageBegin { page: u32 },
    FetchPageSuccess(PagePayload),
    FetchPageError { page: u32, errors: ErrorMap },
    CreateSuccess { id: EntityId, entity: Map<String, Value> },
    CreateError { errors: ErrorMap },
    UpdateSuccess { id: EntityId, entity: Map<String, Value> },
    UpdateError { id: EntityId, errors: ErrorMap },
    DeleteSuccess { id: EntityId },
    DeleteError { id: EntityId, errors: ErrorMap },
}

/// Closed set of event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FetchOneBegin,
    FetchOneSuccess,
    FetchOneError,
    FetchPageBegin,
    FetchPageSuccess,
    FetchPageError,
    CreateSuccess,
    CreateError,
    UpdateSuccess,
    UpdateError,
    DeleteSuccess,
    DeleteError,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchOneBegin => "FETCH_ONE_BEGIN",
            Self::FetchOneSuccess => "FETCH_ONE_SUCCESS",
            Self::FetchOneError => "FETCH_ONE_ERROR",
            Self::FetchPageBegin => "FETCH_PAGE_BEGIN",
            Self::FetchPageSuccess => "FETCH_PAGE_SUCCESS",
            Self::FetchPageError => "FETCH_PAGE_ERROR",
            Self::CreateSuccess => "CREATE_SUCCESS",
            Self::CreateError => "CREATE_ERROR",
            Self::UpdateSuccess => "UPDATE_SUCCESS",
            Self::UpdateError => "UPDATE_ERROR",
            Self::DeleteSuccess => "DELETE_SUCCESS",
            Self::DeleteError => "DELETE_ERROR",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::FetchOneError
                | Self::FetchPageError
                | Self::CreateError
                | Self::UpdateError
                | Self::DeleteError
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ResourceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::FetchOneBegin { .. } => EventKind::FetchOneBegin,
            Self::FetchOneSuccess { .. } => EventKind::FetchOneSuccess,
            Self::FetchOneError { .. } => EventKind::FetchOneError,
            Self::FetchPageBegin { .. } => EventKind::FetchPageBegin,
            Self::FetchPageSuccess(_) => EventKind::FetchPageSuccess,
            Self::FetchPageError { .. } => EventKind::FetchPageError,
            Self::CreateSuccess { .. } => EventKind::CreateSuccess,
            Self::CreateError { .. } => EventKind::CreateError,
            Self::UpdateSuccess { .. } => EventKind::UpdateSuccess,
            Self::UpdateError { .. } => EventKind::UpdateError,
            Self::DeleteSuccess { .. } => EventKind::DeleteSuccess,
            Self::DeleteError { .. } => EventKind::DeleteError,
        }
    }
}

/// An addressed lifecycle event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub address: SliceAddress,
    pub payload: ResourceEvent,
}

impl Event {
    pub fn new(address: SliceAddress, payload: ResourceEvent) -> Self {
        Self { address, payload }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_address_requires_matching_depth() {
        let path = vec!["linodes".to_string(), "backups".to_string()];
        assert!(SliceAddress::nested(path.clone(), vec![]).is_none());
        assert!(SliceAddress::nested(vec![], vec![]).is_none());

        let address = SliceAddress::nested(path, vec![EntityId::from(1235u64)]).unwrap();
        assert_eq!(address.root(), "linodes");
        assert_eq!(address.to_string(), "linodes[1235].backups");
    }

    #[test]
    fn test_event_kind_names() {
        let event = ResourceEvent::DeleteSuccess {
            id: EntityId::from("1"),
        };
        assert_eq!(event.kind().as_str(), "DELETE_SUCCESS");
        assert!(!event.kind().is_error());
        assert!(EventKind::FetchPageError.is_error());
    }
}
