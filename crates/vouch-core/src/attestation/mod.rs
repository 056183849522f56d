//! Attestors: evidence collectors that observe a run.
//!
//! Each attestor has a stable type string (used to target options), a
//! [`RunType`] that decides when it observes, and produces one JSON claim.
//!
//! | Type | Phase | Claim |
//! |------|-------|-------|
//! | `material` | Material | digests of files before the command |
//! | `product` | Product | digests of files created or changed by the command |
//! | `command-run` | Execute | argv, exit code, captured output, traced processes |
//! | `environment` | PreMaterial | OS and environment variables (sensitive values masked) |
//! | `git` | PreMaterial | commit and branch of the enclosing repository |

pub mod builder;
pub mod commandrun;
pub mod environment;
pub mod files;
pub mod git;
pub mod material;
pub mod options;
pub mod product;
pub mod registry;
pub mod trace;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use builder::build_attestors;
pub use options::{bind_options, OptionSetter, OptionSetters};
pub use registry::AttestorRegistry;

/// Digests of one artifact keyed by algorithm (`sha256` -> hex).
pub type DigestSet = BTreeMap<String, String>;

/// When an attestor observes, relative to the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunType {
    PreMaterial,
    Material,
    Execute,
    Product,
    PostProduct,
}

impl RunType {
    pub const ALL: [RunType; 5] = [
        RunType::PreMaterial,
        RunType::Material,
        RunType::Execute,
        RunType::Product,
        RunType::PostProduct,
    ];
}

/// Errors raised by attestors, either while configuring or while observing.
#[derive(Debug, thiserror::Error)]
pub enum AttestorError {
    #[error("unknown option '{key}' for attestor {attestor_type}")]
    UnknownOption { attestor_type: String, key: String },

    #[error("invalid value '{value}' for option '{key}': {reason}")]
    InvalidOption {
        key: String,
        value: String,
        reason: String,
    },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no command to run")]
    EmptyCommand,

    #[error("command exited with status {code}")]
    CommandFailed { code: i32 },

    #[error("not a git repository (or any parent): {}", .path.display())]
    NotARepository { path: PathBuf },

    #[error("malformed git metadata: {reason}")]
    GitMetadata { reason: String },

    #[error("attestor has not observed the run yet")]
    NotObserved,

    #[error("failed to serialize claim: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl AttestorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse a boolean option value.
pub(crate) fn parse_bool(key: &str, value: &str) -> Result<bool, AttestorError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(AttestorError::invalid(key, value, "expected true or false")),
    }
}

/// Shared state handed to attestors while the run progresses.
#[derive(Debug)]
pub struct AttestationContext {
    working_dir: PathBuf,
    materials: BTreeMap<String, DigestSet>,
}

impl AttestationContext {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            materials: BTreeMap::new(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Files recorded before the command ran.
    pub fn materials(&self) -> &BTreeMap<String, DigestSet> {
        &self.materials
    }

    pub fn add_materials(&mut self, materials: &BTreeMap<String, DigestSet>) {
        self.materials
            .extend(materials.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Evidence collector capability.
#[async_trait]
pub trait Attestor: Send + Sync + std::fmt::Debug {
    /// Stable type identifier, e.g. `material`.
    fn attestor_type(&self) -> &str;

    fn run_type(&self) -> RunType;

    /// Apply one named option. Attestors without options reject every key.
    fn set_option(&mut self, key: &str, value: &str) -> Result<(), AttestorError> {
        let _ = value;
        Err(AttestorError::UnknownOption {
            attestor_type: self.attestor_type().to_string(),
            key: key.to_string(),
        })
    }

    /// Observe the run.
    async fn attest(&mut self, ctx: &mut AttestationContext) -> Result<(), AttestorError>;

    /// The claim recorded by [`Attestor::attest`].
    fn claim(&self) -> Result<serde_json::Value, AttestorError>;

    /// Artifacts this attestor vouches for, by name.
    fn subjects(&self) -> BTreeMap<String, DigestSet> {
        BTreeMap::new()
    }
}

/// Run metadata recorded next to the claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub working_dir: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    #[serde(rename = "type")]
    pub attestor_type: String,
    pub attestation: serde_json::Value,
}

/// All claims of one step, in attestor list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Step name.
    pub name: String,
    pub metadata: CollectionMetadata,
    pub attestations: Vec<CollectionEntry>,
}

impl Collection {
    pub fn types(&self) -> Vec<&str> {
        self.attestations
            .iter()
            .map(|e| e.attestor_type.as_str())
            .collect()
    }

    pub fn claim(&self, attestor_type: &str) -> Option<&serde_json::Value> {
        self.attestations
            .iter()
            .find(|e| e.attestor_type == attestor_type)
            .map(|e| &e.attestation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        assert!(parse_bool("silent", "TRUE").unwrap());
        assert!(!parse_bool("silent", "0").unwrap());
        assert!(matches!(
            parse_bool("silent", "maybe"),
            Err(AttestorError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_run_types_are_ordered_by_phase() {
        let mut sorted = RunType::ALL;
        sorted.sort();
        assert_eq!(sorted, RunType::ALL);
        assert!(RunType::Material < RunType::Execute);
        assert!(RunType::Execute < RunType::Product);
    }
}
