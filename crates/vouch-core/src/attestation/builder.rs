//! Ordered attestor set for one run.

use std::collections::BTreeSet;

use tracing::debug;

use super::commandrun::CommandRunAttestor;
use super::material::MaterialAttestor;
use super::product::ProductAttestor;
use super::{Attestor, AttestorRegistry};
use crate::error::RunError;

/// Build `[material, product, command-run?, ...pluggable]`.
///
/// Pluggable names are resolved through `registry` in the order given. A name
/// that is unknown, or whose type is already part of the set, aborts the run
/// before anything executes.
pub fn build_attestors(
    argv: &[String],
    tracing: bool,
    requested: &[String],
    registry: &AttestorRegistry,
) -> Result<Vec<Box<dyn Attestor>>, RunError> {
    let mut attestors: Vec<Box<dyn Attestor>> = vec![
        Box::new(MaterialAttestor::new()),
        Box::new(ProductAttestor::new()),
    ];

    if !argv.is_empty() {
        attestors.push(Box::new(
            CommandRunAttestor::new(argv.to_vec()).with_tracing(tracing),
        ));
    }

    let mut types: BTreeSet<String> = attestors
        .iter()
        .map(|a| a.attestor_type().to_string())
        .collect();

    for name in requested {
        if types.contains(name) {
            return Err(RunError::DuplicateAttestor {
                attestor_type: name.clone(),
            });
        }
        let attestor = registry
            .create(name)
            .ok_or_else(|| RunError::UnknownAttestor { name: name.clone() })?;
        if !types.insert(attestor.attestor_type().to_string()) {
            return Err(RunError::DuplicateAttestor {
                attestor_type: attestor.attestor_type().to_string(),
            });
        }
        attestors.push(attestor);
    }

    debug!(
        attestors = ?attestors.iter().map(|a| a.attestor_type()).collect::<Vec<_>>(),
        "built attestor set"
    );
    Ok(attestors)
}
