//! YAML config file loading and command-line overlay.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use vouch_core::{KeySource, PipelineConfig};

use crate::cli::args::RunArgs;

pub const DEFAULT_CONFIG_FILE: &str = ".vouch.yaml";

/// Load the config file named by `--config`, or `.vouch.yaml` when present.
///
/// An explicitly named file must exist; the default one is optional.
pub fn load(explicit: Option<&Path>) -> Result<PipelineConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.is_file() {
                return Ok(PipelineConfig::default());
            }
            default
        }
    };

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config = parse(&text)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

pub fn parse(text: &str) -> Result<PipelineConfig> {
    if text.trim().is_empty() {
        return Ok(PipelineConfig::default());
    }
    Ok(serde_yaml::from_str(text)?)
}

/// Overlay command-line values on the file config.
///
/// Scalars given on the command line win; a list given on the command line
/// replaces the file's list. Flags can only switch features on.
pub fn merge(mut config: PipelineConfig, args: &RunArgs) -> PipelineConfig {
    if let Some(step) = &args.step {
        config.step = step.clone();
    }

    let keys: Vec<KeySource> = args
        .key
        .iter()
        .cloned()
        .map(KeySource::File)
        .chain(args.key_env.iter().cloned().map(KeySource::Env))
        .collect();
    if !keys.is_empty() {
        config.keys = keys;
    }

    if let Some(outfile) = &args.outfile {
        config.outfile = Some(outfile.clone());
    }
    if !args.timestamp_server.is_empty() {
        config.timestamp_servers = args.timestamp_server.clone();
    }
    if let Some(dir) = &args.workingdir {
        config.working_dir = Some(dir.clone());
    }
    config.tracing |= args.trace;
    if !args.attestation.is_empty() {
        config.attestations = args.attestation.clone();
    }
    if !args.attestor_opt.is_empty() {
        config.attestor_options = args.attestor_opt.clone();
    }

    config.archive.enable |= args.archive;
    if let Some(url) = &args.archive_url {
        config.archive.url = Some(url.clone());
    }
    if let Some(token) = &args.archive_token {
        config.archive.token = Some(token.clone());
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::args::{Cli, Command};

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["vouch", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().cmd {
            Command::Run(args) => args,
            _ => panic!("expected run"),
        }
    }

    const FILE: &str = r#"
step: package
keys:
  - file: ci.pem
timestamp_servers:
  - https://tsa.example/tsr
attestations: [git, environment]
attestor_options:
  - type: product
    key: include-glob
    value: "*.tar.gz"
archive:
  enable: false
  url: https://archive.example
"#;

    #[test]
    fn test_parse_file() {
        let config = parse(FILE).unwrap();
        assert_eq!(config.step, "package");
        assert_eq!(config.keys, vec![KeySource::File("ci.pem".into())]);
        assert_eq!(config.attestations, vec!["git", "environment"]);
        assert_eq!(config.attestor_options[0].value, "*.tar.gz");
        assert_eq!(config.archive.url.as_deref(), Some("https://archive.example"));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(parse("step: build\nsigner: x\n").is_err());
        assert!(parse("archive:\n  enabled: true\n").is_err());
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(parse("  \n").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_cli_overrides_scalars_and_replaces_lists() {
        let args = run_args(&[
            "--step",
            "build",
            "--key-env",
            "SIGNING_KEY",
            "-a",
            "git",
            "--archive",
        ]);
        let merged = merge(parse(FILE).unwrap(), &args);

        assert_eq!(merged.step, "build");
        assert_eq!(merged.keys, vec![KeySource::Env("SIGNING_KEY".into())]);
        assert_eq!(merged.attestations, vec!["git"]);
        // untouched lists survive
        assert_eq!(merged.timestamp_servers, vec!["https://tsa.example/tsr"]);
        assert_eq!(merged.attestor_options.len(), 1);
        assert!(merged.archive.enable);
    }

    #[test]
    fn test_file_values_kept_without_flags() {
        let merged = merge(parse(FILE).unwrap(), &run_args(&[]));
        assert_eq!(merged, parse(FILE).unwrap());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(load(Some(&dir.path().join("nope.yaml"))).is_err());
    }
}
