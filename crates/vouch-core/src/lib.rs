//! Attestation run pipeline.
//!
//! A run resolves exactly one signer, assembles the attestors that observe the
//! step, executes the step while they watch, signs the resulting collection
//! into a DSSE envelope, optionally countersigns it with timestamp
//! authorities, writes it to the output sink and optionally publishes it to a
//! content-addressed archive.
//!
//! ```text
//! signer ─► attestor set ─► option binding ─► run ─► sink ─► publish
//! ```
//!
//! Every stage is fail-fast: an error anywhere aborts the later stages and no
//! unsigned or partially timestamped envelope is ever written.

pub mod attestation;
pub mod config;
pub mod dsse;
pub mod error;
pub mod jcs;
pub mod pipeline;
pub mod publish;
pub mod run;
pub mod signer;
pub mod sink;
pub mod statement;
pub mod timestamp;

pub use attestation::{
    bind_options, build_attestors, AttestationContext, Attestor, AttestorError, AttestorRegistry,
    Collection, CollectionEntry, OptionSetter, OptionSetters, RunType,
};
pub use config::{ArchiveSettings, AttestorOption, PipelineConfig};
pub use dsse::{Envelope, EnvelopeSignature, SignatureTimestamp, PAYLOAD_TYPE_IN_TOTO};
pub use error::RunError;
pub use pipeline::{Pipeline, PipelineOutcome};
pub use publish::{ContentStore, PublishError};
pub use run::{run, RunOptions, RunResult, RunState};
pub use signer::{
    load_signers, resolve_signer, Ed25519Signer, KeySource, Signer, SignerLoadError, SigningError,
};
pub use sink::Sink;
pub use statement::{Statement, Subject};
pub use timestamp::{Rfc3161Timestamper, TimestampError, Timestamper};
