//! Merged run configuration.
//!
//! The CLI deserializes the optional YAML file into [`PipelineConfig`] and
//! overlays command-line values; the result is read-only for the rest of the
//! invocation.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::signer::KeySource;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Name of the step being attested.
    pub step: String,

    pub keys: Vec<KeySource>,

    /// `None` or `-` writes to stdout.
    pub outfile: Option<PathBuf>,

    pub timestamp_servers: Vec<String>,

    /// Defaults to the process working directory.
    pub working_dir: Option<PathBuf>,

    /// Record the command's process tree.
    pub tracing: bool,

    /// Pluggable attestors, in claim order.
    pub attestations: Vec<String>,

    pub attestor_options: Vec<AttestorOption>,

    pub archive: ArchiveSettings,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), RunError> {
        if self.step.trim().is_empty() {
            return Err(invalid("step name is required"));
        }
        let has_url = matches!(self.archive.url.as_deref(), Some(url) if !url.is_empty());
        if self.archive.enable && !has_url {
            return Err(invalid("archive is enabled but no archive url is set"));
        }
        Ok(())
    }
}

/// One `type.key=value` attestor option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttestorOption {
    #[serde(rename = "type")]
    pub attestor_type: String,
    pub key: String,
    pub value: String,
}

impl FromStr for AttestorOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (target, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected <type>.<key>=<value>, got '{s}'"))?;
        let (attestor_type, key) = target
            .split_once('.')
            .ok_or_else(|| format!("expected <type>.<key> before '=', got '{target}'"))?;
        if attestor_type.is_empty() || key.is_empty() {
            return Err(format!("empty attestor type or key in '{s}'"));
        }
        Ok(Self {
            attestor_type: attestor_type.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

impl fmt::Display for AttestorOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}={}", self.attestor_type, self.key, self.value)
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveSettings {
    pub enable: bool,
    pub url: Option<String>,
    pub token: Option<String>,
}

impl fmt::Debug for ArchiveSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveSettings")
            .field("enable", &self.enable)
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn invalid(message: &str) -> RunError {
    RunError::InvalidConfig {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attestor_option() {
        let opt: AttestorOption = "product.include-glob=dist/*.tar.gz".parse().unwrap();
        assert_eq!(opt.attestor_type, "product");
        assert_eq!(opt.key, "include-glob");
        assert_eq!(opt.value, "dist/*.tar.gz");
        assert_eq!(opt.to_string(), "product.include-glob=dist/*.tar.gz");

        // value may itself contain separators
        let opt: AttestorOption = "environment.sensitive-key=A=B.C".parse().unwrap();
        assert_eq!(opt.value, "A=B.C");

        assert!("product".parse::<AttestorOption>().is_err());
        assert!("product=x".parse::<AttestorOption>().is_err());
        assert!(".key=x".parse::<AttestorOption>().is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = PipelineConfig::default();
        assert!(matches!(
            config.validate(),
            Err(RunError::InvalidConfig { .. })
        ));

        config.step = "build".into();
        config.validate().unwrap();

        config.archive.enable = true;
        assert!(config.validate().unwrap_err().is_config_error());
        config.archive.url = Some("https://archive.example".into());
        config.validate().unwrap();
    }

    #[test]
    fn test_deserialize_from_json_shape() {
        let config: PipelineConfig = serde_json::from_value(serde_json::json!({
            "step": "build",
            "keys": [{ "file": "key.pem" }, { "env": "VOUCH_KEY" }],
            "attestations": ["git"],
            "attestor_options": [{ "type": "product", "key": "include-glob", "value": "*.whl" }],
            "archive": { "enable": true, "url": "https://archive.example" }
        }))
        .unwrap();
        assert_eq!(config.keys.len(), 2);
        assert_eq!(config.keys[1], KeySource::Env("VOUCH_KEY".into()));
        assert!(config.archive.enable);

        let err = serde_json::from_value::<PipelineConfig>(serde_json::json!({ "stepp": "x" }));
        assert!(err.is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let settings = ArchiveSettings {
            enable: true,
            url: None,
            token: Some("secret".into()),
        };
        assert!(!format!("{settings:?}").contains("secret"));
    }
}
