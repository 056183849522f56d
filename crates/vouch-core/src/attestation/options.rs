//! Per-type option setters, applied to the attestor set before the run.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use super::{Attestor, AttestorError};
use crate::error::RunError;

/// A configuration-time transformation of one attestor.
pub type OptionSetter =
    Box<dyn Fn(Box<dyn Attestor>) -> Result<Box<dyn Attestor>, AttestorError> + Send + Sync>;

/// Setters keyed by attestor type, kept in registration order.
#[derive(Default)]
pub struct OptionSetters {
    by_type: BTreeMap<String, Vec<OptionSetter>>,
}

impl OptionSetters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, attestor_type: impl Into<String>, setter: F)
    where
        F: Fn(Box<dyn Attestor>) -> Result<Box<dyn Attestor>, AttestorError>
            + Send
            + Sync
            + 'static,
    {
        self.by_type
            .entry(attestor_type.into())
            .or_default()
            .push(Box::new(setter));
    }

    /// Register a setter that applies `key=value` through
    /// [`Attestor::set_option`].
    pub fn set(
        &mut self,
        attestor_type: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        let key = key.into();
        let value = value.into();
        self.push(attestor_type, move |mut attestor| {
            attestor.set_option(&key, &value)?;
            Ok(attestor)
        });
    }

    pub fn for_type(&self, attestor_type: &str) -> &[OptionSetter] {
        self.by_type
            .get(attestor_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.by_type.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

impl fmt::Debug for OptionSetters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<_, _> = self.by_type.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("OptionSetters")
            .field("by_type", &counts)
            .finish()
    }
}

/// Fold every bound setter over its attestor, in registration order.
///
/// The first failing setter aborts the whole set; attestors without setters
/// pass through untouched.
pub fn bind_options(
    attestors: Vec<Box<dyn Attestor>>,
    setters: &OptionSetters,
) -> Result<Vec<Box<dyn Attestor>>, RunError> {
    for attestor_type in setters.types() {
        if !attestors.iter().any(|a| a.attestor_type() == attestor_type) {
            warn!(attestor_type, "options given for an attestor that is not part of the run");
        }
    }

    attestors
        .into_iter()
        .map(|attestor| {
            let attestor_type = attestor.attestor_type().to_string();
            let bound = setters.for_type(&attestor_type);
            if !bound.is_empty() {
                debug!(attestor_type = %attestor_type, count = bound.len(), "applying attestor options");
            }
            bound
                .iter()
                .try_fold(attestor, |current, setter| setter(current))
                .map_err(|source| RunError::AttestorConfig {
                    attestor_type,
                    source,
                })
        })
        .collect()
}
