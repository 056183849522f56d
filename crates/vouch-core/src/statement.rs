//! in-toto statement wrapping the attestation collection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attestation::{Collection, DigestSet};

pub const STATEMENT_TYPE_V01: &str = "https://in-toto.io/Statement/v0.1";

/// Predicate type of a vouch attestation collection.
pub const PREDICATE_TYPE_COLLECTION: &str = "https://vouch.dev/attestation-collection/v0.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub digest: DigestSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(rename = "_type")]
    pub statement_type: String,

    pub subject: Vec<Subject>,

    #[serde(rename = "predicateType")]
    pub predicate_type: String,

    pub predicate: Collection,
}

impl Statement {
    pub fn new(collection: Collection, subjects: BTreeMap<String, DigestSet>) -> Self {
        Self {
            statement_type: STATEMENT_TYPE_V01.to_string(),
            subject: subjects
                .into_iter()
                .map(|(name, digest)| Subject { name, digest })
                .collect(),
            predicate_type: PREDICATE_TYPE_COLLECTION.to_string(),
            predicate: collection,
        }
    }
}
