//! Error taxonomy
//!
//! Configuration problems are fatal and surface at setup time as
//! [`ConfigurationError`]. Transport failures never escape a generated
//! action; they are turned into error events and live in the cache (see
//! [`crate::api::TransportError`]).

use crate::resource::SupportedOp;

/// A malformed resource description or an operation the resource does not
/// support.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("resource config is missing `{0}`")]
    MissingField(&'static str),

    #[error("resource `{0}` must have distinct, non-empty singular and plural names")]
    IndistinctNames(String),

    #[error("resource `{0}` must support at least one of SINGLE or COLLECTION")]
    NoSupportedOps(String),

    #[error("resource `{resource}` does not support {op} operations")]
    UnsupportedOperation { resource: String, op: SupportedOp },

    #[error("invalid endpoint template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("endpoint template for `{resource}` references ancestor {index} but the resource is nested {depth} level(s) deep")]
    AncestorOutOfRange {
        resource: String,
        index: usize,
        depth: usize,
    },

    #[error("`{resource}` expects {expected} ancestor id(s), got {actual}")]
    AncestorCount {
        resource: String,
        expected: usize,
        actual: usize,
    },

    #[error("resource `{0}` is nested and cannot be registered at the top level")]
    NotTopLevel(String),

    #[error("duplicate sub-resource `{child}` under `{parent}`")]
    DuplicateSubResource { parent: String, child: String },

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("unknown action `{action}` for resource `{resource}`")]
    UnknownAction { resource: String, action: String },

    #[error("failed to parse resource definitions: {0}")]
    Definitions(String),
}
