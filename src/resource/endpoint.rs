//! Endpoint templates
//!
//! A template turns an entity id plus its ancestor ids into an API path.
//! Patterns use `{id}` for the entity and `{0}`, `{1}`, ... for ancestors,
//! outermost first: `/linode/instances/{0}/backups/{id}`.

use crate::cache::EntityId;
use crate::error::ConfigurationError;
use std::fmt;
use std::sync::Arc;

type TemplateFn = dyn Fn(Option<&EntityId>, &[EntityId]) -> String + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Id,
    Ancestor(usize),
}

#[derive(Clone)]
enum Kind {
    Pattern { source: String, segments: Vec<Segment> },
    Function(Arc<TemplateFn>),
}

/// Maps `(id, ancestors)` to a path
#[derive(Clone)]
pub struct EndpointTemplate {
    kind: Kind,
}

impl EndpointTemplate {
    /// Parse a placeholder pattern
    pub fn pattern(source: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidTemplate {
            template: source.to_string(),
            reason: reason.to_string(),
        };

        if !source.starts_with('/') {
            return Err(invalid("path must start with '/'"));
        }

        let mut segments = Vec::new();
        let mut rest = source;
        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let Some(close) = rest[open..].find('}') else {
                return Err(invalid("unclosed '{'"));
            };
            let name = &rest[open + 1..open + close];
            let segment = match name {
                "id" => Segment::Id,
                n => n
                    .parse::<usize>()
                    .map(Segment::Ancestor)
                    .map_err(|_| invalid(&format!("unknown placeholder '{{{}}}'", n)))?,
            };
            segments.push(segment);
            rest = &rest[open + close + 1..];
        }
        if rest.contains('}') {
            return Err(invalid("unmatched '}'"));
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            kind: Kind::Pattern {
                source: source.to_string(),
                segments,
            },
        })
    }

    /// Wrap an arbitrary path builder. The caller guarantees it is total
    /// over any id the cache can hold.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Option<&EntityId>, &[EntityId]) -> String + Send + Sync + 'static,
    {
        Self {
            kind: Kind::Function(Arc::new(f)),
        }
    }

    /// Highest ancestor position a pattern refers to
    pub(crate) fn max_ancestor(&self) -> Option<usize> {
        match &self.kind {
            Kind::Pattern { segments, .. } => segments
                .iter()
                .filter_map(|s| match s {
                    Segment::Ancestor(i) => Some(*i),
                    _ => None,
                })
                .max(),
            Kind::Function(_) => None,
        }
    }

    /// Render the path of a single entity
    pub fn entity_path(&self, id: &EntityId, ancestors: &[EntityId]) -> String {
        self.render(Some(id), ancestors)
    }

    /// Render the collection path: the entity path without an id, with
    /// trailing slashes dropped
    pub fn collection_path(&self, ancestors: &[EntityId]) -> String {
        let path = self.render(None, ancestors);
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    }

    fn render(&self, id: Option<&EntityId>, ancestors: &[EntityId]) -> String {
        match &self.kind {
            Kind::Pattern { segments, .. } => {
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        Segment::Literal(s) => out.push_str(s),
                        Segment::Id => {
                            if let Some(id) = id {
                                out.push_str(&urlencoding::encode(id.as_str()));
                            }
                        }
                        Segment::Ancestor(i) => {
                            // Depth is validated when the config is built
                            if let Some(parent) = ancestors.get(*i) {
                                out.push_str(&urlencoding::encode(parent.as_str()));
                            }
                        }
                    }
                }
                out
            }
            Kind::Function(f) => f(id, ancestors),
        }
    }
}

impl fmt::Debug for EndpointTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Pattern { source, .. } => f.debug_tuple("EndpointTemplate").field(source).finish(),
            Kind::Function(_) => f.write_str("EndpointTemplate(<fn>)"),
        }
    }
}
