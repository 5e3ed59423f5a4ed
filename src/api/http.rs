//! HTTP transport for REST API calls

use super::transport::{Method, Transport, TransportError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate long bodies and drop non-printable characters before logging
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// reqwest-backed [`Transport`] rooted at an API base URL
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    api_root: Url,
    token: Option<String>,
}

impl HttpTransport {
    /// Create a transport for `api_root` (e.g. `https://api.linode.com/v4`)
    pub fn new(api_root: &str, token: Option<String>) -> Result<Self> {
        let api_root = Url::parse(api_root)
            .with_context(|| format!("Invalid API root URL: {}", api_root))?;

        let client = Client::builder()
            .user_agent(concat!("apicache/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_root,
            token,
        })
    }

    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    /// Join an API path onto the root, keeping the root's own path prefix
    fn url_for(&self, path: &str, query: &[(String, String)]) -> Result<Url, TransportError> {
        let joined = format!(
            "{}/{}",
            self.api_root.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined).map_err(|e| TransportError::Network(e.to_string()))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, TransportError> {
        let url = self.url_for(path, query)?;
        tracing::debug!("{} {}", method, url);

        let mut request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
            Method::Delete => self.client.delete(url),
        };
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            // Only log sanitized/truncated error bodies
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
            let parsed = serde_json::from_str::<Value>(&text).ok();
            return Err(TransportError::from_status(status.as_u16(), path, parsed));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
    }
}
