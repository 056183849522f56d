//! Signer resolution.
//!
//! Key sources are loaded into signing identities; a run accepts exactly one.

use std::fmt;
use std::path::PathBuf;

use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error};

use crate::error::RunError;

/// A cryptographic identity able to sign arbitrary bytes.
pub trait Signer: Send + Sync {
    /// Stable identifier of the key (`sha256:<hex>` of the SPKI public key).
    fn key_id(&self) -> &str;

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SigningError>;
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct SigningError(pub String);

/// Where signing key material is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// PKCS#8 PEM file on disk.
    File(PathBuf),
    /// Environment variable holding PKCS#8 PEM text.
    Env(String),
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Env(var) => write!(f, "env ${var}"),
        }
    }
}

/// A key source that could not be turned into a signer.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{origin}: {reason}")]
pub struct SignerLoadError {
    pub origin: KeySource,
    pub reason: String,
}

impl SignerLoadError {
    pub fn new(origin: KeySource, reason: impl Into<String>) -> Self {
        Self {
            origin,
            reason: reason.into(),
        }
    }
}

/// Ed25519 signer backed by a PKCS#8 key.
pub struct Ed25519Signer {
    key: SigningKey,
    key_id: String,
}

impl Ed25519Signer {
    pub fn new(key: SigningKey) -> Result<Self, SigningError> {
        let key_id = compute_key_id(&key.verifying_key())?;
        Ok(Self { key, key_id })
    }

    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, SigningError> {
        use pkcs8::DecodePrivateKey;

        let key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| SigningError(format!("failed to parse private key PEM: {e}")))?;
        Self::new(key)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl Signer for Ed25519Signer {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SigningError> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }
}

/// Compute key id from a verifying key.
///
/// Returns `sha256:<lowercase-hex>` over the SPKI DER encoding.
pub fn compute_key_id(key: &VerifyingKey) -> Result<String, SigningError> {
    use pkcs8::EncodePublicKey;

    let doc = key
        .to_public_key_der()
        .map_err(|e| SigningError(format!("failed to encode public key as SPKI DER: {e}")))?;
    Ok(format!("sha256:{}", hex::encode(Sha256::digest(doc.as_bytes()))))
}

fn load_source(source: &KeySource) -> Result<Box<dyn Signer>, SignerLoadError> {
    let pem = match source {
        KeySource::File(path) => std::fs::read_to_string(path)
            .map_err(|e| SignerLoadError::new(source.clone(), format!("failed to read: {e}")))?,
        KeySource::Env(var) => std::env::var(var)
            .map_err(|e| SignerLoadError::new(source.clone(), format!("unavailable: {e}")))?,
    };

    let signer = Ed25519Signer::from_pkcs8_pem(&pem)
        .map_err(|e| SignerLoadError::new(source.clone(), e.0))?;
    debug!(source = %source, key_id = %signer.key_id(), "loaded signer");
    Ok(Box::new(signer))
}

/// Load every configured key source.
///
/// Loading continues past failures so that all misconfigured sources are
/// reported together.
pub fn load_signers(sources: &[KeySource]) -> (Vec<Box<dyn Signer>>, Vec<SignerLoadError>) {
    let mut signers = Vec::new();
    let mut errors = Vec::new();
    for source in sources {
        match load_source(source) {
            Ok(signer) => signers.push(signer),
            Err(e) => errors.push(e),
        }
    }
    (signers, errors)
}

/// Select the single signer for a run.
pub fn resolve_signer(
    mut signers: Vec<Box<dyn Signer>>,
    errors: Vec<SignerLoadError>,
) -> Result<Box<dyn Signer>, RunError> {
    if !errors.is_empty() {
        for err in &errors {
            error!(error = %err, "failed to load signer");
        }
        return Err(RunError::SignerLoad { errors });
    }

    match signers.len() {
        0 => {
            error!("no signers found");
            Err(RunError::NoSigner)
        }
        1 => Ok(signers.remove(0)),
        count => {
            error!(count, "only one signer is supported");
            Err(RunError::AmbiguousSigner { count })
        }
    }
}
