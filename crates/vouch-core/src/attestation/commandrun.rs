//! Command execution attestor.
//!
//! Spawns the step's command, mirrors its output to stderr while capturing
//! it, and records the exit code. With tracing enabled, a background task
//! polls procfs for the command's process tree until the command exits.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::trace::{scan_process_tree, ProcessInfo};
use super::{parse_bool, AttestationContext, Attestor, AttestorError, RunType};

pub const TYPE: &str = "command-run";

const PROC_ROOT: &str = "/proc";
const TRACE_POLL_INTERVAL: Duration = Duration::from_millis(25);
const PIPE_BUF_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRunClaim {
    pub cmd: Vec<String>,
    pub exitcode: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processes: Option<Vec<ProcessInfo>>,
}

#[derive(Debug)]
pub struct CommandRunAttestor {
    argv: Vec<String>,
    tracing: bool,
    silent: bool,
    claim: Option<CommandRunClaim>,
}

impl CommandRunAttestor {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            tracing: false,
            silent: false,
            claim: None,
        }
    }

    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = tracing;
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn tracing(&self) -> bool {
        self.tracing
    }

    pub fn silent(&self) -> bool {
        self.silent
    }

    pub fn result(&self) -> Option<&CommandRunClaim> {
        self.claim.as_ref()
    }
}

#[async_trait]
impl Attestor for CommandRunAttestor {
    fn attestor_type(&self) -> &str {
        TYPE
    }

    fn run_type(&self) -> RunType {
        RunType::Execute
    }

    fn set_option(&mut self, key: &str, value: &str) -> Result<(), AttestorError> {
        match key {
            "silent" => self.silent = parse_bool(key, value)?,
            "trace" => self.tracing = parse_bool(key, value)?,
            _ => {
                return Err(AttestorError::UnknownOption {
                    attestor_type: TYPE.to_string(),
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    async fn attest(&mut self, ctx: &mut AttestationContext) -> Result<(), AttestorError> {
        let (program, args) = self.argv.split_first().ok_or(AttestorError::EmptyCommand)?;
        info!(cmd = ?self.argv, tracing = self.tracing, "running command");

        let mut child = Command::new(program)
            .args(args)
            .current_dir(ctx.working_dir())
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AttestorError::Spawn {
                program: program.clone(),
                source,
            })?;

        let mirror = || (!self.silent).then(tokio::io::stderr);
        let stdout_task = pump(child.stdout.take(), mirror());
        let stderr_task = pump(child.stderr.take(), mirror());

        let (stop_tx, stop_rx) = oneshot::channel();
        let tracer = match child.id() {
            Some(pid) if self.tracing && cfg!(target_os = "linux") => {
                Some(tokio::spawn(trace_until(pid, stop_rx)))
            }
            _ => {
                if self.tracing {
                    warn!("process tracing is only available on Linux; continuing without it");
                }
                None
            }
        };

        let status = child.wait().await.map_err(|source| AttestorError::Wait {
            program: program.clone(),
            source,
        })?;
        let _ = stop_tx.send(());

        let stdout = join_pipe(stdout_task, "<stdout>").await?;
        let stderr = join_pipe(stderr_task, "<stderr>").await?;
        let processes = match tracer {
            Some(handle) => Some(join_tracer(handle).await),
            None => None,
        };

        let exitcode = status.code().unwrap_or(-1);
        debug!(exitcode, "command finished");

        self.claim = Some(CommandRunClaim {
            cmd: self.argv.clone(),
            exitcode,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            processes,
        });

        if !status.success() {
            return Err(AttestorError::CommandFailed { code: exitcode });
        }
        Ok(())
    }

    fn claim(&self) -> Result<serde_json::Value, AttestorError> {
        let claim = self.claim.as_ref().ok_or(AttestorError::NotObserved)?;
        Ok(serde_json::to_value(claim)?)
    }
}

/// Copy a child pipe into memory, optionally mirroring it.
fn pump<R, W>(reader: Option<R>, mut mirror: Option<W>) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut captured = Vec::new();
        let Some(mut reader) = reader else {
            return Ok(captured);
        };
        let mut buf = vec![0u8; PIPE_BUF_SIZE];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            captured.extend_from_slice(&buf[..n]);
            if let Some(out) = mirror.as_mut() {
                out.write_all(&buf[..n]).await?;
                out.flush().await?;
            }
        }
        Ok(captured)
    })
}

async fn join_pipe(
    task: JoinHandle<std::io::Result<Vec<u8>>>,
    name: &str,
) -> Result<Vec<u8>, AttestorError> {
    match task.await {
        Ok(result) => result.map_err(|e| AttestorError::io(name, e)),
        Err(e) => Err(AttestorError::io(name, std::io::Error::other(e))),
    }
}

async fn join_tracer(handle: JoinHandle<Vec<ProcessInfo>>) -> Vec<ProcessInfo> {
    match handle.await {
        Ok(processes) => processes,
        Err(e) => {
            warn!(error = %e, "process tracer failed; recording no processes");
            Vec::new()
        }
    }
}

async fn trace_until(pid: u32, mut stop: oneshot::Receiver<()>) -> Vec<ProcessInfo> {
    let proc_root = Path::new(PROC_ROOT);
    let mut seen: BTreeMap<u32, ProcessInfo> = BTreeMap::new();
    let mut interval = tokio::time::interval(TRACE_POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = interval.tick() => match scan_process_tree(proc_root, pid) {
                Ok(procs) => {
                    for p in procs {
                        seen.entry(p.pid).or_insert(p);
                    }
                }
                Err(e) => debug!(error = %e, "procfs scan failed"),
            },
        }
    }
    seen.into_values().collect()
}
