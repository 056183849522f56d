//! Run orchestrator: observe the step, sign the collection, countersign.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info};

use crate::attestation::{
    AttestationContext, Attestor, Collection, CollectionEntry, CollectionMetadata, DigestSet,
    RunType,
};
use crate::dsse::{Envelope, SignatureTimestamp, PAYLOAD_TYPE_IN_TOTO, TIMESTAMP_TYPE_TSP};
use crate::error::RunError;
use crate::jcs;
use crate::signer::{Signer, SigningError};
use crate::statement::Statement;
use crate::timestamp::Timestamper;

/// Progress of a single run. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    Start,
    MaterialsCollected,
    CommandExecuted,
    ProductsCollected,
    EnvelopeSigned,
    Timestamped,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::MaterialsCollected => "materials_collected",
            Self::CommandExecuted => "command_executed",
            Self::ProductsCollected => "products_collected",
            Self::EnvelopeSigned => "envelope_signed",
            Self::Timestamped => "timestamped",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct StateTracker {
    step: String,
    state: RunState,
}

impl StateTracker {
    fn new(step: &str) -> Self {
        debug!(step, state = %RunState::Start, "run state");
        Self {
            step: step.to_string(),
            state: RunState::Start,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(next > self.state, "{} -> {}", self.state, next);
        debug!(step = %self.step, from = %self.state, to = %next, "run state");
        self.state = next;
    }

    fn fail(&mut self, err: &RunError) {
        debug!(step = %self.step, from = %self.state, error = %err, "run state failed");
        self.state = RunState::Failed;
    }
}

/// Everything a run needs besides the step name and signer.
pub struct RunOptions {
    /// Attestors in list order; claims keep this order.
    pub attestors: Vec<Box<dyn Attestor>>,
    pub working_dir: PathBuf,
    pub timestampers: Vec<Box<dyn Timestamper>>,
}

impl RunOptions {
    pub fn new(attestors: Vec<Box<dyn Attestor>>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            attestors,
            working_dir: working_dir.into(),
            timestampers: Vec::new(),
        }
    }

    pub fn with_timestampers(mut self, timestampers: Vec<Box<dyn Timestamper>>) -> Self {
        self.timestampers = timestampers;
        self
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("attestors", &self.attestors)
            .field("working_dir", &self.working_dir)
            .field(
                "timestampers",
                &self.timestampers.iter().map(|t| t.url()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Signed outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub envelope: Envelope,
    pub collection: Collection,
}

/// Execute one step under observation and sign the result.
///
/// Attestors observe in phase order and, within a phase, in list order. The
/// canonical statement is signed exactly once; every timestamper must
/// countersign for the run to succeed.
pub async fn run(
    step: &str,
    signer: &dyn Signer,
    options: RunOptions,
) -> Result<RunResult, RunError> {
    let mut tracker = StateTracker::new(step);
    match run_inner(step, signer, options, &mut tracker).await {
        Ok(result) => {
            tracker.advance(RunState::Done);
            info!(
                step,
                attestations = result.collection.attestations.len(),
                "run complete"
            );
            Ok(result)
        }
        Err(err) => {
            tracker.fail(&err);
            Err(err)
        }
    }
}

async fn run_inner(
    step: &str,
    signer: &dyn Signer,
    options: RunOptions,
    tracker: &mut StateTracker,
) -> Result<RunResult, RunError> {
    let RunOptions {
        mut attestors,
        working_dir,
        timestampers,
    } = options;

    let started_at = Utc::now();
    let mut ctx = AttestationContext::new(&working_dir);

    for phase in RunType::ALL {
        let mut observed = false;
        for attestor in attestors.iter_mut().filter(|a| a.run_type() == phase) {
            debug!(attestor = attestor.attestor_type(), ?phase, "attesting");
            attestor
                .attest(&mut ctx)
                .await
                .map_err(|source| RunError::Observation {
                    attestor: attestor.attestor_type().to_string(),
                    source,
                })?;
            observed = true;
        }

        match phase {
            RunType::Material => tracker.advance(RunState::MaterialsCollected),
            RunType::Execute if observed => tracker.advance(RunState::CommandExecuted),
            RunType::Product => tracker.advance(RunState::ProductsCollected),
            _ => {}
        }
    }

    let finished_at = Utc::now();

    let mut subjects: BTreeMap<String, DigestSet> = BTreeMap::new();
    let mut entries = Vec::with_capacity(attestors.len());
    for attestor in &attestors {
        let attestation = attestor.claim().map_err(|source| RunError::Observation {
            attestor: attestor.attestor_type().to_string(),
            source,
        })?;
        subjects.extend(attestor.subjects());
        entries.push(CollectionEntry {
            attestor_type: attestor.attestor_type().to_string(),
            attestation,
        });
    }

    let collection = Collection {
        name: step.to_string(),
        metadata: CollectionMetadata {
            working_dir: working_dir.display().to_string(),
            started_at,
            finished_at,
        },
        attestations: entries,
    };

    let statement = Statement::new(collection.clone(), subjects);
    let payload = jcs::to_vec(&statement)
        .map_err(|e| SigningError(format!("failed to canonicalize statement: {e}")))?;
    let (mut envelope, signature) = Envelope::sign(PAYLOAD_TYPE_IN_TOTO, &payload, signer)?;
    tracker.advance(RunState::EnvelopeSigned);

    if !timestampers.is_empty() {
        let timestamps = countersign(&timestampers, &signature).await?;
        if let Some(entry) = envelope.signatures.first_mut() {
            entry.timestamps = timestamps;
        }
        tracker.advance(RunState::Timestamped);
    }

    Ok(RunResult {
        envelope,
        collection,
    })
}

/// Ask every timestamper concurrently; all must succeed.
async fn countersign(
    timestampers: &[Box<dyn Timestamper>],
    signature: &[u8],
) -> Result<Vec<SignatureTimestamp>, RunError> {
    let responses = join_all(timestampers.iter().map(|t| t.timestamp(signature))).await;

    timestampers
        .iter()
        .zip(responses)
        .map(|(timestamper, response)| {
            let token = response.map_err(|source| RunError::Timestamp {
                url: timestamper.url().to_string(),
                source,
            })?;
            debug!(url = timestamper.url(), bytes = token.len(), "received timestamp");
            Ok(SignatureTimestamp {
                kind: TIMESTAMP_TYPE_TSP.to_string(),
                data: BASE64.encode(token),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::AttestorError;
    use crate::signer::Ed25519Signer;
    use crate::timestamp::TimestampError;
    use async_trait::async_trait;
    use ed25519_dalek::SigningKey;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn signer() -> Ed25519Signer {
        Ed25519Signer::new(SigningKey::from_bytes(&[7u8; 32])).unwrap()
    }

    /// Records the order it was asked to observe in.
    #[derive(Debug)]
    struct PhaseRecorder {
        name: &'static str,
        phase: RunType,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl PhaseRecorder {
        fn boxed(
            name: &'static str,
            phase: RunType,
            log: &Arc<Mutex<Vec<&'static str>>>,
        ) -> Box<dyn Attestor> {
            Box::new(Self {
                name,
                phase,
                log: log.clone(),
                fail: false,
            })
        }
    }

    #[async_trait]
    impl Attestor for PhaseRecorder {
        fn attestor_type(&self) -> &str {
            self.name
        }
        fn run_type(&self) -> RunType {
            self.phase
        }
        async fn attest(&mut self, _ctx: &mut AttestationContext) -> Result<(), AttestorError> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(AttestorError::NotObserved);
            }
            Ok(())
        }
        fn claim(&self) -> Result<serde_json::Value, AttestorError> {
            Ok(serde_json::json!({ "name": self.name }))
        }
    }

    struct FixedTsa {
        url: &'static str,
        result: Result<Vec<u8>, ()>,
    }

    #[async_trait]
    impl Timestamper for FixedTsa {
        fn url(&self) -> &str {
            self.url
        }
        async fn timestamp(&self, _signature: &[u8]) -> Result<Vec<u8>, TimestampError> {
            self.result.clone().map_err(|()| TimestampError::Network {
                message: "unreachable".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_phases_run_in_order_and_claims_keep_list_order() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let attestors = vec![
            PhaseRecorder::boxed("post", RunType::PostProduct, &log),
            PhaseRecorder::boxed("prod", RunType::Product, &log),
            PhaseRecorder::boxed("exec", RunType::Execute, &log),
            PhaseRecorder::boxed("mat", RunType::Material, &log),
            PhaseRecorder::boxed("pre", RunType::PreMaterial, &log),
        ];

        let result = run("build", &signer(), RunOptions::new(attestors, dir.path()))
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["pre", "mat", "exec", "prod", "post"]
        );
        assert_eq!(
            result.collection.types(),
            vec!["post", "prod", "exec", "mat", "pre"]
        );
    }

    #[tokio::test]
    async fn test_signed_payload_matches_collection() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let signer = signer();

        let result = run(
            "build",
            &signer,
            RunOptions::new(vec![PhaseRecorder::boxed("mat", RunType::Material, &log)], dir.path()),
        )
        .await
        .unwrap();

        result
            .envelope
            .verify_ed25519(signer.key_id(), &signer.verifying_key())
            .unwrap();
        let statement = result.envelope.decode_statement().unwrap();
        assert_eq!(statement.predicate, result.collection);
        assert_eq!(statement.predicate.name, "build");
        assert!(result.envelope.signatures[0].timestamps.is_empty());
    }

    #[tokio::test]
    async fn test_observation_failure_stops_later_phases() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing = Box::new(PhaseRecorder {
            name: "mat",
            phase: RunType::Material,
            log: log.clone(),
            fail: true,
        });
        let attestors: Vec<Box<dyn Attestor>> =
            vec![failing, PhaseRecorder::boxed("prod", RunType::Product, &log)];

        let err = run("build", &signer(), RunOptions::new(attestors, dir.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Observation { ref attestor, .. } if attestor == "mat"));
        assert_eq!(*log.lock().unwrap(), vec!["mat"]);
    }

    #[tokio::test]
    async fn test_timestamps_attached_in_timestamper_order() {
        let dir = TempDir::new().unwrap();
        let tsas: Vec<Box<dyn Timestamper>> = vec![
            Box::new(FixedTsa {
                url: "https://a.example",
                result: Ok(vec![1]),
            }),
            Box::new(FixedTsa {
                url: "https://b.example",
                result: Ok(vec![2]),
            }),
        ];

        let options = RunOptions::new(Vec::new(), dir.path()).with_timestampers(tsas);
        let result = run("build", &signer(), options).await.unwrap();

        let stamps = &result.envelope.signatures[0].timestamps;
        assert_eq!(stamps.len(), 2);
        assert_eq!(stamps[0].kind, "tsp");
        assert_eq!(stamps[0].data, BASE64.encode([1u8]));
        assert_eq!(stamps[1].data, BASE64.encode([2u8]));
    }

    #[tokio::test]
    async fn test_any_timestamp_failure_fails_the_run() {
        let dir = TempDir::new().unwrap();
        let tsas: Vec<Box<dyn Timestamper>> = vec![
            Box::new(FixedTsa {
                url: "https://ok.example",
                result: Ok(vec![1]),
            }),
            Box::new(FixedTsa {
                url: "https://down.example",
                result: Err(()),
            }),
        ];

        let options = RunOptions::new(Vec::new(), dir.path()).with_timestampers(tsas);
        match run("build", &signer(), options).await {
            Err(RunError::Timestamp { url, .. }) => assert_eq!(url, "https://down.example"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_states_are_forward_ordered() {
        assert!(RunState::Start < RunState::MaterialsCollected);
        assert!(RunState::EnvelopeSigned < RunState::Timestamped);
        assert!(RunState::Timestamped < RunState::Done);
        assert_eq!(RunState::ProductsCollected.to_string(), "products_collected");
    }
}
