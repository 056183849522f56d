//! Pipeline error taxonomy.
//!
//! Every variant is terminal for the invocation. Nothing is retried.

use crate::attestation::AttestorError;
use crate::publish::PublishError;
use crate::signer::{SignerLoadError, SigningError};
use crate::timestamp::TimestampError;

/// Errors that abort an attestation run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// One or more key sources could not be loaded. All failures are kept.
    #[error("failed to load signers: {}", join_errors(.errors))]
    SignerLoad { errors: Vec<SignerLoadError> },

    #[error("only one signer is supported, found {count}")]
    AmbiguousSigner { count: usize },

    #[error("no signers found")]
    NoSigner,

    #[error("unknown attestor: {name}")]
    UnknownAttestor { name: String },

    /// The same attestor type was requested more than once.
    #[error("attestor {attestor_type} is already part of the run")]
    DuplicateAttestor { attestor_type: String },

    #[error("failed to set attestor option for {attestor_type}: {source}")]
    AttestorConfig {
        attestor_type: String,
        #[source]
        source: AttestorError,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("attestor {attestor} failed: {source}")]
    Observation {
        attestor: String,
        #[source]
        source: AttestorError,
    },

    #[error("failed to sign envelope: {0}")]
    Signing(#[from] SigningError),

    #[error("timestamp authority {url} failed: {source}")]
    Timestamp {
        url: String,
        #[source]
        source: TimestampError,
    },

    #[error("failed to marshal envelope: {0}")]
    EnvelopeMarshal(#[source] serde_json::Error),

    #[error("failed to open out file {target}: {source}")]
    SinkOpen {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write envelope to {target}: {source}")]
    SinkWrite {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Raised after the local artifact was written; the artifact stays valid.
    #[error("failed to store artifact in archive: {0}")]
    Publish(#[from] PublishError),
}

impl RunError {
    /// True for errors caused by configuration rather than by the run itself.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::SignerLoad { .. }
                | Self::AmbiguousSigner { .. }
                | Self::NoSigner
                | Self::UnknownAttestor { .. }
                | Self::DuplicateAttestor { .. }
                | Self::AttestorConfig { .. }
                | Self::InvalidConfig { .. }
        )
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Publish(_) => 3,
            e if e.is_config_error() => 2,
            _ => 1,
        }
    }
}

fn join_errors(errors: &[SignerLoadError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::KeySource;

    #[test]
    fn test_signer_load_reports_every_error() {
        let err = RunError::SignerLoad {
            errors: vec![
                SignerLoadError::new(KeySource::File("a.pem".into()), "missing"),
                SignerLoadError::new(KeySource::Env("VOUCH_KEY".into()), "not set"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("a.pem"), "{msg}");
        assert!(msg.contains("VOUCH_KEY"), "{msg}");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunError::NoSigner.exit_code(), 2);
        assert_eq!(
            RunError::UnknownAttestor {
                name: "nope".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(
            RunError::Signing(SigningError("boom".into())).exit_code(),
            1
        );
        assert_eq!(
            RunError::Publish(PublishError::Unavailable {
                message: "down".into()
            })
            .exit_code(),
            3
        );
    }
}
