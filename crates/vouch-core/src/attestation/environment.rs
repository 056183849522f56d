//! Environment attestor.
//!
//! Records the platform and the process environment. Variables whose names
//! match a sensitive pattern are masked, or dropped with `filter-sensitive`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use super::files::check_glob;
use super::{parse_bool, AttestationContext, Attestor, AttestorError, RunType};

pub const TYPE: &str = "environment";

const MASK: &str = "******";

/// Name patterns treated as secrets; matched case-insensitively.
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "*TOKEN*",
    "*SECRET*",
    "*PASSWORD*",
    "*PASSWD*",
    "*API_KEY*",
    "*APIKEY*",
    "*PRIVATE_KEY*",
    "*CREDENTIAL*",
    "AWS_*",
    "*_KEY",
    "VOUCH_ARCHIVE_TOKEN",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentClaim {
    pub os: String,
    pub arch: String,
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct EnvironmentAttestor {
    sensitive: Vec<String>,
    filter_sensitive: bool,
    claim: Option<EnvironmentClaim>,
}

impl Default for EnvironmentAttestor {
    fn default() -> Self {
        Self {
            sensitive: DEFAULT_SENSITIVE_KEYS.iter().map(|s| s.to_string()).collect(),
            filter_sensitive: false,
            claim: None,
        }
    }
}

impl EnvironmentAttestor {
    pub fn new() -> Self {
        Self::default()
    }

    fn sensitive_set(&self) -> Result<GlobSet, AttestorError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.sensitive {
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| AttestorError::invalid("sensitive-key", pattern, e.to_string()))?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|e| AttestorError::invalid("sensitive-key", "", e.to_string()))
    }

    /// Build the claim from an explicit variable list.
    pub(crate) fn capture(
        &self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<EnvironmentClaim, AttestorError> {
        let sensitive = self.sensitive_set()?;
        let mut variables = BTreeMap::new();
        for (name, value) in vars {
            if sensitive.is_match(&name) {
                if self.filter_sensitive {
                    continue;
                }
                variables.insert(name, MASK.to_string());
            } else {
                variables.insert(name, value);
            }
        }
        Ok(EnvironmentClaim {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            variables,
        })
    }
}

#[async_trait]
impl Attestor for EnvironmentAttestor {
    fn attestor_type(&self) -> &str {
        TYPE
    }

    fn run_type(&self) -> RunType {
        RunType::PreMaterial
    }

    fn set_option(&mut self, key: &str, value: &str) -> Result<(), AttestorError> {
        match key {
            "filter-sensitive" => self.filter_sensitive = parse_bool(key, value)?,
            "sensitive-key" => {
                check_glob(key, value)?;
                self.sensitive.push(value.to_string());
            }
            _ => {
                return Err(AttestorError::UnknownOption {
                    attestor_type: TYPE.to_string(),
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    async fn attest(&mut self, _ctx: &mut AttestationContext) -> Result<(), AttestorError> {
        self.claim = Some(self.capture(std::env::vars_os().map(|(k, v)| {
            (
                k.to_string_lossy().into_owned(),
                v.to_string_lossy().into_owned(),
            )
        }))?);
        Ok(())
    }

    fn claim(&self) -> Result<serde_json::Value, AttestorError> {
        let claim = self.claim.as_ref().ok_or(AttestorError::NotObserved)?;
        Ok(serde_json::to_value(claim)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_sensitive_values_are_masked() {
        let attestor = EnvironmentAttestor::new();
        let claim = attestor
            .capture(vars(&[
                ("PATH", "/usr/bin"),
                ("GITHUB_TOKEN", "ghp_x"),
                ("aws_secret_access_key", "abc"),
            ]))
            .unwrap();
        assert_eq!(claim.variables["PATH"], "/usr/bin");
        assert_eq!(claim.variables["GITHUB_TOKEN"], MASK);
        assert_eq!(claim.variables["aws_secret_access_key"], MASK);
    }

    #[test]
    fn test_archive_token_is_masked_by_name() {
        let mut attestor = EnvironmentAttestor::new();
        attestor.sensitive.retain(|p| p == "VOUCH_ARCHIVE_TOKEN");
        let claim = attestor
            .capture(vars(&[("VOUCH_ARCHIVE_TOKEN", "t0ken"), ("VOUCH_STEP", "build")]))
            .unwrap();
        assert_eq!(claim.variables["VOUCH_ARCHIVE_TOKEN"], MASK);
        assert_eq!(claim.variables["VOUCH_STEP"], "build");
    }

    #[test]
    fn test_filter_sensitive_drops_values() {
        let mut attestor = EnvironmentAttestor::new();
        attestor.set_option("filter-sensitive", "true").unwrap();
        attestor.set_option("sensitive-key", "BUILD_ID").unwrap();

        let claim = attestor
            .capture(vars(&[
                ("HOME", "/root"),
                ("DB_PASSWORD", "x"),
                ("BUILD_ID", "42"),
            ]))
            .unwrap();
        assert_eq!(claim.variables.len(), 1);
        assert!(claim.variables.contains_key("HOME"));
    }

    #[tokio::test]
    async fn test_attest_reads_process_environment() {
        let mut attestor = EnvironmentAttestor::new();
        let mut ctx = AttestationContext::new(".");
        attestor.attest(&mut ctx).await.unwrap();

        let claim = attestor.claim().unwrap();
        assert_eq!(claim["os"], std::env::consts::OS);
        assert!(claim["variables"].is_object());
    }
}
