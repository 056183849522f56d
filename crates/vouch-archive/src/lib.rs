//! Content-addressed archive client.
//!
//! Uploads signed DSSE envelopes to an archive service and returns the
//! gitoid under which the service stored them.
//!
//! # Quick Start
//!
//! ```no_run
//! use vouch_archive::{ArchiveClient, ArchiveConfig};
//! use vouch_core::ContentStore;
//!
//! # async fn example(envelope: vouch_core::Envelope) -> Result<(), Box<dyn std::error::Error>> {
//! let client = ArchiveClient::new(ArchiveConfig::new("https://archive.example.dev"))?;
//! let gitoid = client.store(&envelope).await?;
//! println!("stored as {gitoid}");
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `VOUCH_ARCHIVE_URL` | Archive base URL |
//! | `VOUCH_ARCHIVE_TOKEN` | Bearer token |
//! | `VOUCH_ARCHIVE_TIMEOUT` | Request timeout in seconds (default: 30) |
//!
//! Requests are never retried.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ArchiveClient, ARCHIVE_USER_AGENT};
pub use error::{ArchiveError, ArchiveResult};
pub use types::{ArchiveConfig, StoreResponse};
