//! Pre-run file snapshot.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::files::{build_globset, check_glob, record_artifacts};
use super::{AttestationContext, Attestor, AttestorError, DigestSet, RunType};

pub const TYPE: &str = "material";

#[derive(Debug, Default)]
pub struct MaterialAttestor {
    exclude: Vec<String>,
    materials: Option<BTreeMap<String, DigestSet>>,
}

impl MaterialAttestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude_globs(&self) -> &[String] {
        &self.exclude
    }

    pub fn materials(&self) -> Option<&BTreeMap<String, DigestSet>> {
        self.materials.as_ref()
    }
}

#[async_trait]
impl Attestor for MaterialAttestor {
    fn attestor_type(&self) -> &str {
        TYPE
    }

    fn run_type(&self) -> RunType {
        RunType::Material
    }

    fn set_option(&mut self, key: &str, value: &str) -> Result<(), AttestorError> {
        match key {
            "exclude-glob" => {
                check_glob(key, value)?;
                self.exclude.push(value.to_string());
                Ok(())
            }
            _ => Err(AttestorError::UnknownOption {
                attestor_type: TYPE.to_string(),
                key: key.to_string(),
            }),
        }
    }

    async fn attest(&mut self, ctx: &mut AttestationContext) -> Result<(), AttestorError> {
        let exclude = build_globset(&self.exclude)?;
        let materials = record_artifacts(ctx.working_dir(), &|name| !exclude.is_match(name))?;
        ctx.add_materials(&materials);
        self.materials = Some(materials);
        Ok(())
    }

    fn claim(&self) -> Result<serde_json::Value, AttestorError> {
        let materials = self.materials.as_ref().ok_or(AttestorError::NotObserved)?;
        Ok(serde_json::to_value(materials)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_records_files_and_shares_with_context() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("input.txt"), "abc").unwrap();
        std::fs::write(dir.path().join("noise.tmp"), "x").unwrap();

        let mut attestor = MaterialAttestor::new();
        attestor.set_option("exclude-glob", "*.tmp").unwrap();

        let mut ctx = AttestationContext::new(dir.path());
        attestor.attest(&mut ctx).await.unwrap();

        assert!(ctx.materials().contains_key("input.txt"));
        assert!(!ctx.materials().contains_key("noise.tmp"));

        let claim = attestor.claim().unwrap();
        assert_eq!(
            claim["input.txt"]["sha256"],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_claim_before_attest_fails() {
        assert!(matches!(
            MaterialAttestor::new().claim(),
            Err(AttestorError::NotObserved)
        ));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let mut attestor = MaterialAttestor::new();
        assert!(matches!(
            attestor.set_option("include-glob", "*"),
            Err(AttestorError::UnknownOption { .. })
        ));
    }
}
