//! Run command arguments.

use std::path::PathBuf;

use clap::Parser;
use vouch_core::AttestorOption;

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Name of the step being attested
    #[arg(long, short = 's', env = "VOUCH_STEP")]
    pub step: Option<String>,

    /// PKCS#8 PEM private key file (repeatable; paths are never split)
    #[arg(long, short = 'k', env = "VOUCH_KEY")]
    pub key: Vec<PathBuf>,

    /// Environment variable holding a PKCS#8 PEM private key
    #[arg(long, env = "VOUCH_KEY_ENV", value_delimiter = ',')]
    pub key_env: Vec<String>,

    /// File to write the signed envelope to ('-' for stdout)
    #[arg(long, short = 'o', env = "VOUCH_OUTFILE")]
    pub outfile: Option<PathBuf>,

    /// RFC 3161 timestamp authority URL (repeatable)
    #[arg(long, short = 't', env = "VOUCH_TIMESTAMP_SERVERS", value_delimiter = ',')]
    pub timestamp_server: Vec<String>,

    /// Directory the step runs in and artifacts are recorded from
    #[arg(long, short = 'd', env = "VOUCH_WORKINGDIR")]
    pub workingdir: Option<PathBuf>,

    /// Record the command's process tree
    #[arg(long, env = "VOUCH_TRACE")]
    pub trace: bool,

    /// Additional attestor to run (repeatable, claims keep this order)
    #[arg(long, short = 'a', env = "VOUCH_ATTESTATIONS", value_delimiter = ',')]
    pub attestation: Vec<String>,

    /// Attestor option as <type>.<key>=<value> (repeatable)
    #[arg(long = "attestor-opt", value_name = "TYPE.KEY=VALUE")]
    pub attestor_opt: Vec<AttestorOption>,

    /// Publish the envelope to the archive after writing it
    #[arg(long, env = "VOUCH_ARCHIVE")]
    pub archive: bool,

    /// Archive base URL
    #[arg(long, env = "VOUCH_ARCHIVE_URL")]
    pub archive_url: Option<String>,

    /// Archive bearer token
    #[arg(long, env = "VOUCH_ARCHIVE_TOKEN", hide_env_values = true)]
    pub archive_token: Option<String>,

    /// YAML config file (default: .vouch.yaml when present)
    #[arg(long, short = 'c', env = "VOUCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Command to run, after `--`
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}
