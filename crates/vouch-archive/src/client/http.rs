//! HTTP layer: auth header and status mapping.
//!
//! This is the ONLY place for status code handling. client/mod.rs never
//! interprets status codes. There is no retry loop.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::warn;

use crate::error::{ArchiveError, ArchiveResult};

#[derive(Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpBackend {
    pub(crate) async fn post_json(
        &self,
        url: &str,
        body: Vec<u8>,
    ) -> ArchiveResult<reqwest::Response> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;
        map_status(response).await
    }
}

async fn map_status(response: reqwest::Response) -> ArchiveResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        body
    };
    warn!(status = status.as_u16(), "archive request failed");

    Err(match status.as_u16() {
        401 | 403 => ArchiveError::Unauthorized { message },
        413 => ArchiveError::TooLarge { message },
        code => ArchiveError::Http {
            status: code,
            message,
        },
    })
}
