//! DSSE envelope.
//!
//! Signatures are computed over the Pre-Authentication Encoding of the
//! payload type and the raw payload bytes.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::signer::{Signer, SigningError};
use crate::statement::Statement;

/// Payload type of an in-toto statement.
pub const PAYLOAD_TYPE_IN_TOTO: &str = "application/vnd.in-toto+json";

/// Timestamp type for RFC 3161 tokens.
pub const TIMESTAMP_TYPE_TSP: &str = "tsp";

/// Signed envelope as written to the output sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "payloadType")]
    pub payload_type: String,

    /// Base64-encoded payload.
    pub payload: String,

    pub signatures: Vec<EnvelopeSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeSignature {
    #[serde(rename = "keyid")]
    pub key_id: String,

    /// Base64-encoded signature.
    pub sig: String,

    /// Countersignatures over the decoded `sig` bytes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timestamps: Vec<SignatureTimestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureTimestamp {
    #[serde(rename = "type")]
    pub kind: String,

    /// Base64-encoded timestamp response.
    pub data: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("payload is not valid base64: {0}")]
    PayloadEncoding(#[from] base64::DecodeError),

    #[error("payload is not a valid statement: {0}")]
    PayloadJson(#[from] serde_json::Error),

    #[error("envelope has no signature for key {key_id}")]
    MissingSignature { key_id: String },

    #[error("signature invalid: {reason}")]
    SignatureInvalid { reason: String },
}

/// Build DSSE Pre-Authentication Encoding (PAE).
///
/// ```text
/// PAE(type, payload) = "DSSEv1" SP LEN(type) SP type SP LEN(payload) SP payload
/// ```
pub fn pae(payload_type: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + payload_type.len() + 32);
    out.extend_from_slice(b"DSSEv1 ");
    out.extend_from_slice(payload_type.len().to_string().as_bytes());
    out.push(b' ');
    out.extend_from_slice(payload_type.as_bytes());
    out.push(b' ');
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.push(b' ');
    out.extend_from_slice(payload);
    out
}

impl Envelope {
    /// Sign `payload` once with `signer`.
    ///
    /// Returns the envelope and the raw signature bytes, which timestamp
    /// authorities countersign.
    pub fn sign(
        payload_type: &str,
        payload: &[u8],
        signer: &dyn Signer,
    ) -> Result<(Self, Vec<u8>), SigningError> {
        let sig = signer.sign(&pae(payload_type, payload))?;
        let envelope = Self {
            payload_type: payload_type.to_string(),
            payload: BASE64.encode(payload),
            signatures: vec![EnvelopeSignature {
                key_id: signer.key_id().to_string(),
                sig: BASE64.encode(&sig),
                timestamps: Vec::new(),
            }],
        };
        Ok((envelope, sig))
    }

    pub fn decode_payload(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(BASE64.decode(&self.payload)?)
    }

    pub fn decode_statement(&self) -> Result<Statement, EnvelopeError> {
        Ok(serde_json::from_slice(&self.decode_payload()?)?)
    }

    /// Verify the ed25519 signature made by `key_id`.
    pub fn verify_ed25519(&self, key_id: &str, key: &VerifyingKey) -> Result<(), EnvelopeError> {
        let entry = self
            .signatures
            .iter()
            .find(|s| s.key_id == key_id)
            .ok_or_else(|| EnvelopeError::MissingSignature {
                key_id: key_id.to_string(),
            })?;

        let sig_bytes = BASE64
            .decode(&entry.sig)
            .map_err(|e| EnvelopeError::SignatureInvalid {
                reason: format!("invalid base64: {e}"),
            })?;
        let signature =
            Signature::from_slice(&sig_bytes).map_err(|e| EnvelopeError::SignatureInvalid {
                reason: e.to_string(),
            })?;

        let payload = self.decode_payload()?;
        key.verify(&pae(&self.payload_type, &payload), &signature)
            .map_err(|e| EnvelopeError::SignatureInvalid {
                reason: e.to_string(),
            })
    }
}
