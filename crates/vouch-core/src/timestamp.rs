//! RFC 3161 timestamp authority client.
//!
//! The signature bytes are hashed with SHA-256 and sent as a DER
//! `TimeStampReq`. The DER `TimeStampResp` is kept verbatim once its
//! `PKIStatus` reports the request as granted.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use sha2::{Digest, Sha256};
use tracing::debug;

const USER_AGENT_VALUE: &str = concat!("vouch/", env!("CARGO_PKG_VERSION"));
const CONTENT_TYPE_QUERY: &str = "application/timestamp-query";
const CONTENT_TYPE_REPLY: &str = "application/timestamp-reply";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// DER `AlgorithmIdentifier` for SHA-256 (2.16.840.1.101.3.4.2.1, NULL params).
const SHA256_ALGORITHM_ID: [u8; 15] = [
    0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01, 0x05, 0x00,
];

/// Countersigns a signature with a trusted time reference.
#[async_trait]
pub trait Timestamper: Send + Sync {
    /// Endpoint identity used in error reports.
    fn url(&self) -> &str;

    async fn timestamp(&self, signature: &[u8]) -> Result<Vec<u8>, TimestampError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TimestampError {
    #[error("invalid timestamp authority url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("invalid timestamp response: {message}")]
    InvalidResponse { message: String },

    #[error("timestamp request rejected with PKIStatus {status}")]
    Rejected { status: u8 },
}

impl From<reqwest::Error> for TimestampError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rfc3161Timestamper {
    client: reqwest::Client,
    url: String,
}

impl Rfc3161Timestamper {
    pub fn new(url: &str) -> Result<Self, TimestampError> {
        Self::with_timeout(url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self, TimestampError> {
        let parsed = url::Url::parse(url).map_err(|e| TimestampError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TimestampError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TimestampError::Network {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Timestamper for Rfc3161Timestamper {
    fn url(&self) -> &str {
        &self.url
    }

    async fn timestamp(&self, signature: &[u8]) -> Result<Vec<u8>, TimestampError> {
        let digest = Sha256::digest(signature);
        let request = encode_request(digest.as_slice());
        debug!(url = %self.url, "requesting timestamp");

        let response = self
            .client
            .post(&self.url)
            .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE))
            .header(CONTENT_TYPE, CONTENT_TYPE_QUERY)
            .header(ACCEPT, CONTENT_TYPE_REPLY)
            .body(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(TimestampError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?.to_vec();
        check_response(&body)?;
        Ok(body)
    }
}

/// DER `TimeStampReq { version 1, messageImprint, certReq TRUE }`.
pub fn encode_request(sha256_digest: &[u8]) -> Vec<u8> {
    let mut imprint = Vec::with_capacity(51);
    imprint.extend_from_slice(&SHA256_ALGORITHM_ID);
    imprint.push(0x04);
    imprint.push(sha256_digest.len() as u8);
    imprint.extend_from_slice(sha256_digest);

    let mut body = Vec::with_capacity(59);
    body.extend_from_slice(&[0x02, 0x01, 0x01]);
    body.push(0x30);
    body.push(imprint.len() as u8);
    body.extend_from_slice(&imprint);
    body.extend_from_slice(&[0x01, 0x01, 0xff]);

    let mut out = Vec::with_capacity(body.len() + 2);
    out.push(0x30);
    out.push(body.len() as u8);
    out.extend_from_slice(&body);
    out
}

/// Check that a `TimeStampResp` is granted and carries a token.
pub fn check_response(der: &[u8]) -> Result<(), TimestampError> {
    let invalid = |message: &str| TimestampError::InvalidResponse {
        message: message.to_string(),
    };

    let (tag, resp, _) = read_tlv(der).ok_or_else(|| invalid("truncated response"))?;
    if tag != 0x30 {
        return Err(invalid("response is not a SEQUENCE"));
    }
    let (tag, status_info, token) =
        read_tlv(resp).ok_or_else(|| invalid("missing PKIStatusInfo"))?;
    if tag != 0x30 {
        return Err(invalid("PKIStatusInfo is not a SEQUENCE"));
    }
    let (tag, status, _) = read_tlv(status_info).ok_or_else(|| invalid("missing PKIStatus"))?;
    if tag != 0x02 || status.len() != 1 {
        return Err(invalid("malformed PKIStatus"));
    }

    // granted (0) or grantedWithMods (1)
    match status[0] {
        0 | 1 if !token.is_empty() => Ok(()),
        0 | 1 => Err(invalid("granted response without a timestamp token")),
        other => Err(TimestampError::Rejected { status: other }),
    }
}

/// Split one DER TLV into (tag, contents, rest).
fn read_tlv(input: &[u8]) -> Option<(u8, &[u8], &[u8])> {
    let (&tag, rest) = input.split_first()?;
    let (&first, rest) = rest.split_first()?;
    let (len, rest) = if first < 0x80 {
        (first as usize, rest)
    } else {
        let n = (first & 0x7f) as usize;
        if n == 0 || n > 4 || rest.len() < n {
            return None;
        }
        let len = rest[..n].iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
        (len, &rest[n..])
    };
    if rest.len() < len {
        return None;
    }
    Some((tag, &rest[..len], &rest[len..]))
}
