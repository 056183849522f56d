use anyhow::Result;
use tracing::{error, info};
use vouch_archive::{ArchiveClient, ArchiveConfig};
use vouch_core::{AttestorRegistry, Pipeline, PipelineConfig, RunError};

use super::config;
use crate::cli::args::RunArgs;
use crate::exit_codes;

pub async fn run(args: RunArgs) -> Result<i32> {
    let file_config = match config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e:#}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    let config = config::merge(file_config, &args);
    let registry = AttestorRegistry::with_builtins();

    match execute(&config, &registry, &args.command).await {
        Ok(()) => Ok(exit_codes::SUCCESS),
        Err(err) => {
            let code = exit_codes::for_run_error(&err);
            error!(error = %err, code, "run failed");
            eprintln!("error: {:#}", anyhow::Error::from(err));
            Ok(code)
        }
    }
}

async fn execute(
    config: &PipelineConfig,
    registry: &AttestorRegistry,
    argv: &[String],
) -> Result<(), RunError> {
    let mut pipeline = Pipeline::new(config, registry)?;

    if config.archive.enable {
        let url = config.archive.url.clone().unwrap_or_default();
        let mut archive = ArchiveConfig::new(url);
        if let Some(token) = &config.archive.token {
            archive = archive.with_token(token.clone());
        }
        let client = ArchiveClient::new(archive).map_err(|e| RunError::InvalidConfig {
            message: e.to_string(),
        })?;
        pipeline = pipeline.with_store(Box::new(client));
    }

    let outcome = pipeline.execute(argv).await?;

    if let Some(gitoid) = &outcome.gitoid {
        eprintln!("stored in archive: {gitoid}");
    }
    info!(
        step = %config.step,
        attestations = ?outcome.result.collection.types(),
        "attestation written"
    );
    Ok(())
}
