//! Error types for the archive client.

use vouch_core::PublishError;

/// Archive errors.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Missing or rejected credentials (401/403).
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Envelope exceeds the archive's upload limit (413).
    #[error("envelope too large: {message}")]
    TooLarge { message: String },

    /// Any other non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl From<reqwest::Error> for ArchiveError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

impl From<ArchiveError> for PublishError {
    fn from(err: ArchiveError) -> Self {
        let message = err.to_string();
        match err {
            ArchiveError::Network { .. } => Self::Unavailable { message },
            ArchiveError::Http { status, .. } if status >= 500 => Self::Unavailable { message },
            ArchiveError::InvalidResponse { .. } => Self::InvalidResponse { message },
            ArchiveError::Unauthorized { .. }
            | ArchiveError::TooLarge { .. }
            | ArchiveError::Http { .. }
            | ArchiveError::Config { .. } => Self::Rejected { message },
        }
    }
}

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_error_classification() {
        let unavailable = PublishError::from(ArchiveError::Http {
            status: 502,
            message: "bad gateway".into(),
        });
        assert!(matches!(unavailable, PublishError::Unavailable { .. }));

        let rejected = PublishError::from(ArchiveError::Http {
            status: 422,
            message: "bad envelope".into(),
        });
        assert!(matches!(rejected, PublishError::Rejected { ref message } if message.contains("422")));

        assert!(matches!(
            PublishError::from(ArchiveError::Unauthorized {
                message: "no token".into()
            }),
            PublishError::Rejected { .. }
        ));
    }
}
