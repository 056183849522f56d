//! Content-addressed archive seam.
//!
//! The pipeline only needs "store this envelope, give me its id"; the HTTP
//! client lives in `vouch-archive`.

use async_trait::async_trait;

use crate::dsse::Envelope;

/// Content-addressed store for signed envelopes.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Upload `envelope` and return the store's identifier (a gitoid).
    async fn store(&self, envelope: &Envelope) -> Result<String, PublishError>;
}

/// Failure reported by a [`ContentStore`].
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The store answered and refused the upload.
    #[error("archive rejected the envelope: {message}")]
    Rejected { message: String },

    /// The store could not be reached or failed server-side.
    #[error("archive unavailable: {message}")]
    Unavailable { message: String },

    #[error("invalid archive response: {message}")]
    InvalidResponse { message: String },
}
