//! Microsoft Graph API client
//!
//! Typed HTTP client for the Graph API: authentication headers, endpoint
//! construction, JSON deserialization, and error surfacing. Error messages
//! carry the HTTP status line (`403 Forbidden`, `410 Gone`, ...) so the
//! sync controller's classifier can act on them.

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// Base URL for Microsoft Graph API v1.0
const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Response from the /me endpoint, used as the reachability probe
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    display_name: Option<String>,
    user_principal_name: Option<String>,
}

/// HTTP client for Microsoft Graph API calls
///
/// Wraps `reqwest::Client` with bearer-token injection and base URL
/// construction. Cloneable; clones share the underlying connection pool.
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl GraphClient {
    /// Creates a client with the given access token against the production API
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, GRAPH_BASE_URL)
    }

    /// Creates a client with a custom base URL (useful for testing)
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }

    /// Creates an authenticated request builder for a path under the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    /// Creates an authenticated request builder for an absolute URL
    ///
    /// Pagination links (`@odata.nextLink`) come back absolute; they are
    /// followed as-is rather than re-rooted under the base URL.
    pub fn request_absolute(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    /// Sends a request and deserializes a JSON body, surfacing HTTP errors
    ///
    /// A non-success status becomes an error carrying the status line and
    /// a body snippet, which is what the engine's error classifier reads.
    pub async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.context("graph request failed")?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            anyhow::bail!("graph request failed: {status}: {snippet}");
        }

        response
            .json::<T>()
            .await
            .context("graph response body was not the expected JSON")
    }

    /// One lightweight reachability probe (`GET /me`)
    ///
    /// Returns the account label on success; fails fast with the status
    /// line on permission errors.
    pub async fn probe(&self) -> Result<String> {
        let me: MeResponse = self.fetch_json(self.request(Method::GET, "/me")).await?;
        let label = me
            .display_name
            .or(me.user_principal_name)
            .unwrap_or_else(|| "unknown account".to_string());
        debug!(account = %label, "Graph probe succeeded");
        Ok(label)
    }
}
