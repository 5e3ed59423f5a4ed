//! Transport boundary
//!
//! Generated actions talk to the API only through [`Transport`]. The host
//! supplies the implementation ([`super::http::HttpTransport`] in the CLI,
//! stubs in tests).

use crate::cache::{ErrorDetail, ErrorMap};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

/// Issues one API request and returns the parsed JSON body (`Null` for an
/// empty body)
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, TransportError>;
}

/// Structured error body: `{ "errors": [{ "reason": ..., "field": ... }] }`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrors {
    pub errors: Vec<ErrorDetail>,
}

/// A failed API call
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("resource not found: {path}")]
    NotFound { path: String, body: Option<Value> },

    #[error("API request failed: {status}")]
    Status { status: u16, body: Option<Value> },

    #[error("failed to send request: {0}")]
    Network(String),

    #[error("failed to parse response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Build from a non-success status and the (possibly JSON) body
    pub fn from_status(status: u16, path: &str, body: Option<Value>) -> Self {
        if status == 404 {
            Self::NotFound {
                path: path.to_string(),
                body,
            }
        } else {
            Self::Status { status, body }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Status { status, .. } => Some(*status),
            Self::Network(_) | Self::Decode(_) => None,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::NotFound { body, .. } | Self::Status { body, .. } => body.as_ref(),
            Self::Network(_) | Self::Decode(_) => None,
        }
    }

    /// Structured error entries the server sent, if any
    pub fn details(&self) -> Option<ApiErrors> {
        let body = self.body()?.clone();
        serde_json::from_value::<ApiErrors>(body)
            .ok()
            .filter(|e| !e.errors.is_empty())
    }

    /// Error entries for the cache: the structured ones, or a single generic
    /// reason under `_`
    pub fn error_map(&self) -> ErrorMap {
        match self.details() {
            Some(api) => ErrorMap::from_details(api.errors),
            None => ErrorMap::from_details(vec![ErrorDetail::new(self.generic_reason())]),
        }
    }

    /// User-facing message that does not leak API internals
    pub fn generic_reason(&self) -> String {
        match self.status() {
            Some(401) => "Authentication failed. Check your API token.".to_string(),
            Some(403) => "Permission denied.".to_string(),
            Some(404) => "Resource not found.".to_string(),
            Some(409) => "Resource conflict. It may already exist or be in use.".to_string(),
            Some(429) => "Rate limit exceeded. Please try again later.".to_string(),
            Some(400) => "Invalid request. Check your parameters.".to_string(),
            Some(s) if s >= 500 => "API temporarily unavailable. Please try again.".to_string(),
            _ => match self {
                Self::Decode(_) => "Unexpected response from the API.".to_string(),
                _ => "Request failed. Check your network connection and try again.".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::GLOBAL_SCOPE;
    use serde_json::json;

    #[test]
    fn test_404_is_not_found() {
        let err = TransportError::from_status(404, "/linode/instances/1", None);
        assert!(matches!(err, TransportError::NotFound { .. }));
        assert_eq!(err.status(), Some(404));
        assert_eq!(
            err.error_map().global().unwrap()[0].reason,
            "Resource not found."
        );
    }

    #[test]
    fn test_structured_details_are_used() {
        let err = TransportError::from_status(
            400,
            "/account/clients",
            Some(json!({"errors": [
                {"reason": "Nooo!"},
                {"reason": "Label required", "field": "label"}
            ]})),
        );
        let details = err.details().unwrap();
        assert_eq!(details.errors.len(), 2);

        let map = err.error_map();
        assert_eq!(map.global(), Some(&[ErrorDetail::new("Nooo!")][..]));
        assert_eq!(map.scope("label").unwrap()[0].field.as_deref(), Some("label"));
    }

    #[test]
    fn test_unstructured_body_falls_back_to_generic_reason() {
        let err = TransportError::from_status(503, "/x", Some(json!({"message": "down"})));
        assert!(err.details().is_none());
        let map = err.error_map();
        assert_eq!(map.scopes().collect::<Vec<_>>(), vec![GLOBAL_SCOPE]);
        assert!(map.global().unwrap()[0].reason.contains("temporarily unavailable"));

        let err = TransportError::Network("connection refused".to_string());
        assert!(err.error_map().global().unwrap()[0].reason.contains("network"));
    }
}
