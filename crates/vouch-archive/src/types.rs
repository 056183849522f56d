//! Archive configuration and wire types.

use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, ArchiveResult};

/// Archive client configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Base URL of the archive service.
    pub url: String,

    /// Bearer token.
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl std::fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ArchiveConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            timeout_secs: default_timeout(),
        }
    }

    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `VOUCH_ARCHIVE_URL` | Archive base URL (required) |
    /// | `VOUCH_ARCHIVE_TOKEN` | Bearer token |
    /// | `VOUCH_ARCHIVE_TIMEOUT` | Request timeout in seconds |
    pub fn from_env() -> ArchiveResult<Self> {
        let url = std::env::var("VOUCH_ARCHIVE_URL").map_err(|_| ArchiveError::Config {
            message: "VOUCH_ARCHIVE_URL is not set".to_string(),
        })?;
        Ok(Self {
            url,
            token: std::env::var("VOUCH_ARCHIVE_TOKEN").ok(),
            timeout_secs: std::env::var("VOUCH_ARCHIVE_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Body returned by `POST /upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreResponse {
    pub gitoid: String,
}
