//! # HTTP Agent
//!
//! [`Agent`] implementation backed by `reqwest`.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::provider::{Agent, Method};

/// Header carrying the agent's admin API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// An agent reached over HTTP.
#[derive(Clone, Debug)]
pub struct HttpAgent {
    base_url: String,
    client: reqwest::Client,
    headers: HeaderMap,
}

impl HttpAgent {
    /// Create an agent client for the admin API at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            headers: HeaderMap::new(),
        }
    }

    /// Authenticate admin calls with an API key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the key is not a valid header value.
    pub fn with_api_key(mut self, api_key: &str) -> Result<Self> {
        let value = HeaderValue::from_str(api_key)
            .map_err(|e| Error::Config(format!("invalid API key: {e}")))?;
        self.headers.insert(API_KEY_HEADER, value);
        Ok(self)
    }

    /// Authenticate admin calls with a bearer token (multitenant wallets).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the token is not a valid header value.
    pub fn with_token(mut self, token: &str) -> Result<Self> {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::Config(format!("invalid bearer token: {e}")))?;
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    /// Base URL of the agent's admin API.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Agent for HttpAgent {
    async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::debug!("{method} {url}");

        let mut request = self.client.request(method, &url).headers(self.headers.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| Error::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!("{url} returned {status}: {text}");
            return Err(Error::Agent {
                status: status.as_u16(),
                body: parse_body(&text).unwrap_or(Value::String(text)),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        parse_body(&text)
            .ok_or_else(|| Error::InvalidResponse(format!("{url} returned a non-JSON body")))
    }
}

fn parse_body(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        assert_eq!(HttpAgent::new("http://alice:3001/").base_url(), "http://alice:3001");
    }

    #[test]
    fn api_key_header_is_set() {
        let agent = HttpAgent::new("http://alice:3001").with_api_key("secret").unwrap();
        assert_eq!(agent.headers.get(API_KEY_HEADER).unwrap(), "secret");

        let agent = agent.with_token("abc").unwrap();
        assert_eq!(agent.headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[test]
    fn invalid_api_key_is_rejected() {
        let err = HttpAgent::new("http://alice:3001").with_api_key("bad\nkey").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn unreachable_agent_is_transport_error() {
        // port 9 (discard) on localhost is not expected to accept HTTP
        let agent = HttpAgent::new("http://127.0.0.1:9");
        let err = agent.call(Method::GET, "/status", None).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
