use clap::{Parser, Subcommand};

pub mod run;
pub use run::*;

#[derive(Parser)]
#[command(
    name = "vouch",
    version,
    about = "Attest build steps: observe a command, sign what it read and produced"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a step under observation and write a signed attestation
    Run(RunArgs),
    /// Generate an ed25519 keypair for signing attestations
    Keygen(super::commands::keygen::KeygenArgs),
    Version,
}

#[cfg(test)]
mod tests;
