//! Post-run file snapshot.
//!
//! Records files that did not exist before the command or whose digest
//! changed, filtered by include and exclude globs.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::files::{build_globset, check_glob, record_artifacts};
use super::{AttestationContext, Attestor, AttestorError, DigestSet, RunType};

pub const TYPE: &str = "product";

const DEFAULT_INCLUDE: &str = "*";

#[derive(Debug)]
pub struct ProductAttestor {
    include: Vec<String>,
    include_is_default: bool,
    exclude: Vec<String>,
    products: Option<BTreeMap<String, DigestSet>>,
}

impl Default for ProductAttestor {
    fn default() -> Self {
        Self {
            include: vec![DEFAULT_INCLUDE.to_string()],
            include_is_default: true,
            exclude: Vec::new(),
            products: None,
        }
    }
}

impl ProductAttestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_globs(&self) -> &[String] {
        &self.include
    }

    pub fn exclude_globs(&self) -> &[String] {
        &self.exclude
    }

    pub fn products(&self) -> Option<&BTreeMap<String, DigestSet>> {
        self.products.as_ref()
    }
}

#[async_trait]
impl Attestor for ProductAttestor {
    fn attestor_type(&self) -> &str {
        TYPE
    }

    fn run_type(&self) -> RunType {
        RunType::Product
    }

    fn set_option(&mut self, key: &str, value: &str) -> Result<(), AttestorError> {
        match key {
            "include-glob" => {
                check_glob(key, value)?;
                // first explicit include replaces the match-all default
                if self.include_is_default {
                    self.include.clear();
                    self.include_is_default = false;
                }
                self.include.push(value.to_string());
                Ok(())
            }
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
        let include = build_globset(&self.include)?;
        let exclude = build_globset(&self.exclude)?;
        let current = record_artifacts(ctx.working_dir(), &|name| {
            include.is_match(name) && !exclude.is_match(name)
        })?;

        let materials = ctx.materials();
        let products = current
            .into_iter()
            .filter(|(name, digest)| materials.get(name) != Some(digest))
            .collect();
        self.products = Some(products);
        Ok(())
    }

    fn claim(&self) -> Result<serde_json::Value, AttestorError> {
        let products = self.products.as_ref().ok_or(AttestorError::NotObserved)?;
        Ok(serde_json::to_value(products)?)
    }

    fn subjects(&self) -> BTreeMap<String, DigestSet> {
        self.products
            .iter()
            .flatten()
            .map(|(name, digest)| (format!("file:{name}"), digest.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_only_new_or_changed_files_are_products() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("unchanged.txt"), "same").unwrap();
        std::fs::write(dir.path().join("changed.txt"), "before").unwrap();

        let mut ctx = AttestationContext::new(dir.path());
        let mut material = super::super::material::MaterialAttestor::new();
        material.attest(&mut ctx).await.unwrap();

        std::fs::write(dir.path().join("changed.txt"), "after").unwrap();
        std::fs::write(dir.path().join("new.bin"), "fresh").unwrap();

        let mut product = ProductAttestor::new();
        product.attest(&mut ctx).await.unwrap();

        let names: Vec<_> = product.products().unwrap().keys().cloned().collect();
        assert_eq!(names, vec!["changed.txt", "new.bin"]);
        assert!(product.subjects().contains_key("file:new.bin"));
    }

    #[test]
    fn test_include_globs_apply_in_order() {
        let mut product = ProductAttestor::new();
        assert_eq!(product.include_globs(), ["*"]);

        product.set_option("include-glob", "*.bin").unwrap();
        product.set_option("include-glob", "dist/**").unwrap();
        assert_eq!(product.include_globs(), ["*.bin", "dist/**"]);
    }

    #[tokio::test]
    async fn test_include_and_exclude_filters() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.bin"), "1").unwrap();
        std::fs::write(dir.path().join("debug.bin"), "1").unwrap();
        std::fs::write(dir.path().join("notes.md"), "1").unwrap();

        let mut product = ProductAttestor::new();
        product.set_option("include-glob", "*.bin").unwrap();
        product.set_option("exclude-glob", "debug*").unwrap();

        let mut ctx = AttestationContext::new(dir.path());
        product.attest(&mut ctx).await.unwrap();

        let names: Vec<_> = product.products().unwrap().keys().cloned().collect();
        assert_eq!(names, vec!["app.bin"]);
    }
}
