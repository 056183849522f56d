//! End-to-end invocation: configuration in, written (and published) envelope out.

use std::path::PathBuf;

use tracing::{info, instrument};

use crate::attestation::{bind_options, build_attestors, environment, AttestorRegistry, OptionSetters};
use crate::config::PipelineConfig;
use crate::error::RunError;
use crate::publish::ContentStore;
use crate::run::{run, RunOptions, RunResult};
use crate::signer::{load_signers, resolve_signer, KeySource};
use crate::sink::Sink;
use crate::timestamp::{Rfc3161Timestamper, Timestamper};

/// Result of a complete invocation.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub result: RunResult,
    /// Exact bytes handed to the sink.
    pub written: Vec<u8>,
    /// Archive identifier, when publishing is enabled.
    pub gitoid: Option<String>,
}

/// One configured invocation.
///
/// Publishing happens only when a [`ContentStore`] is attached.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    registry: &'a AttestorRegistry,
    setters: OptionSetters,
    timestampers: Vec<Box<dyn Timestamper>>,
    store: Option<Box<dyn ContentStore>>,
    sink: Option<Sink>,
}

impl<'a> Pipeline<'a> {
    /// Validate `config` and prepare setters and timestampers from it.
    pub fn new(config: &'a PipelineConfig, registry: &'a AttestorRegistry) -> Result<Self, RunError> {
        config.validate()?;

        let mut setters = OptionSetters::new();
        for opt in &config.attestor_options {
            setters.set(&opt.attestor_type, &opt.key, &opt.value);
        }

        let timestampers = config
            .timestamp_servers
            .iter()
            .map(|url| {
                Rfc3161Timestamper::new(url)
                    .map(|t| Box::new(t) as Box<dyn Timestamper>)
                    .map_err(|e| RunError::InvalidConfig {
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            registry,
            setters,
            timestampers,
            store: None,
            sink: None,
        })
    }

    /// Replace the option setters derived from the configuration.
    pub fn with_setters(mut self, setters: OptionSetters) -> Self {
        self.setters = setters;
        self
    }

    pub fn with_timestampers(mut self, timestampers: Vec<Box<dyn Timestamper>>) -> Self {
        self.timestampers = timestampers;
        self
    }

    pub fn with_store(mut self, store: Box<dyn ContentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Write to `sink` instead of the configured out file.
    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run the step `argv` (empty for a command-less step).
    ///
    /// Signer, attestor set and options are all resolved before the out file
    /// is opened, so configuration errors leave it untouched.
    #[instrument(skip_all, fields(step = %self.config.step))]
    pub async fn execute(self, argv: &[String]) -> Result<PipelineOutcome, RunError> {
        let config = self.config;

        let (signers, errors) = load_signers(&config.keys);
        let signer = resolve_signer(signers, errors)?;

        let attestors = build_attestors(argv, config.tracing, &config.attestations, self.registry)?;
        let mut setters = self.setters;
        if attestors
            .iter()
            .any(|a| a.attestor_type() == environment::TYPE)
        {
            mask_key_sources(&mut setters, &config.keys);
        }
        let attestors = bind_options(attestors, &setters)?;

        let working_dir = match &config.working_dir {
            Some(dir) => dir.clone(),
            None => current_dir()?,
        };

        let mut sink = match self.sink {
            Some(sink) => sink,
            None => Sink::open(config.outfile.as_deref())?,
        };

        let options = RunOptions::new(attestors, working_dir).with_timestampers(self.timestampers);
        let result = run(&config.step, signer.as_ref(), options).await?;

        let written = sink.write_envelope(&result.envelope)?;
        drop(sink);

        let gitoid = match &self.store {
            Some(store) => {
                let gitoid = store.store(&result.envelope).await?;
                info!(gitoid = %gitoid, "stored attestation in archive");
                Some(gitoid)
            }
            None => None,
        };

        Ok(PipelineOutcome {
            result,
            written,
            gitoid,
        })
    }
}

/// Key material read from the environment must not appear in the
/// environment claim, whatever the variable is called.
fn mask_key_sources(setters: &mut OptionSetters, keys: &[KeySource]) {
    for key in keys {
        if let KeySource::Env(var) = key {
            setters.set(environment::TYPE, "sensitive-key", literal_glob(var));
        }
    }
}

fn literal_glob(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '*' | '?' | '[' | ']' | '{' | '}' | '\\' => format!("[{c}]"),
            _ => c.to_string(),
        })
        .collect()
}

fn current_dir() -> Result<PathBuf, RunError> {
    std::env::current_dir().map_err(|e| RunError::InvalidConfig {
        message: format!("cannot determine working directory: {e}"),
    })
}
