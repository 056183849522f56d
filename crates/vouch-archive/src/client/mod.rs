//! Archive client.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info};
use vouch_core::{ContentStore, Envelope, PublishError};

use crate::error::{ArchiveError, ArchiveResult};
use crate::types::{ArchiveConfig, StoreResponse};

mod http;

use http::HttpBackend;

pub const ARCHIVE_USER_AGENT: &str = concat!("vouch-archive/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ArchiveClient {
    http: HttpBackend,
}

impl ArchiveClient {
    pub fn new(config: ArchiveConfig) -> ArchiveResult<Self> {
        let parsed = url::Url::parse(&config.url).map_err(|e| ArchiveError::Config {
            message: format!("invalid archive url '{}': {}", config.url, e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ArchiveError::Config {
                message: format!("unsupported archive url scheme '{}'", parsed.scheme()),
            });
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(ARCHIVE_USER_AGENT));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| ArchiveError::Network {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http: HttpBackend {
                client,
                base_url: config.url.trim_end_matches('/').to_string(),
                token: config.token,
            },
        })
    }

    pub fn from_env() -> ArchiveResult<Self> {
        Self::new(ArchiveConfig::from_env()?)
    }

    pub fn base_url(&self) -> &str {
        &self.http.base_url
    }

    /// Upload `envelope`, returning the archive's gitoid for it.
    pub async fn upload(&self, envelope: &Envelope) -> ArchiveResult<String> {
        let url = format!("{}/upload", self.http.base_url);
        debug!(url = %url, "uploading envelope");

        let body = serde_json::to_vec(envelope).map_err(|e| ArchiveError::InvalidResponse {
            message: format!("failed to serialize envelope: {}", e),
        })?;
        let response = self.http.post_json(&url, body).await?;

        let stored: StoreResponse =
            response
                .json()
                .await
                .map_err(|e| ArchiveError::InvalidResponse {
                    message: format!("failed to parse upload response: {}", e),
                })?;
        if stored.gitoid.trim().is_empty() {
            return Err(ArchiveError::InvalidResponse {
                message: "upload response has an empty gitoid".to_string(),
            });
        }

        info!(gitoid = %stored.gitoid, "envelope archived");
        Ok(stored.gitoid)
    }
}

#[async_trait]
impl ContentStore for ArchiveClient {
    async fn store(&self, envelope: &Envelope) -> Result<String, PublishError> {
        Ok(self.upload(envelope).await?)
    }
}
