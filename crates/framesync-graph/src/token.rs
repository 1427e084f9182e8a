//! Read-only OAuth token file access
//!
//! Tokens are produced and refreshed by external tooling; the engine only
//! ever reads the file. Load failures are worded so the sync controller
//! classifies them as permanent (operator action is required either way).

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// OAuth tokens as written by the external authentication utility
#[derive(Debug, Clone, Deserialize)]
pub struct TokenFile {
    /// Bearer token for API requests
    pub access_token: String,
    /// Refresh token, unused by the engine but kept for diagnostics
    pub refresh_token: Option<String>,
    /// When the access token expires, if the tooling recorded it
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenFile {
    /// Loads and validates the token file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "permission denied: token file {} is missing or unreadable",
                path.display()
            )
        })?;

        let token: TokenFile = serde_json::from_str(&content).with_context(|| {
            format!(
                "invalid_grant: token file {} does not contain a usable token",
                path.display()
            )
        })?;

        if token.access_token.trim().is_empty() {
            anyhow::bail!(
                "invalid_grant: token file {} has an empty access token",
                path.display()
            );
        }

        Ok(token)
    }

    /// Whether the recorded expiry is in the past
    ///
    /// An unrecorded expiry counts as not expired; the API itself is the
    /// authority and will reject a stale token.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }
}
