//! Output destination for the signed envelope.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::dsse::Envelope;
use crate::error::RunError;

const STDOUT_LABEL: &str = "stdout";

/// Exclusively owned writer for one invocation. Released on drop.
pub struct Sink {
    writer: Box<dyn Write + Send>,
    label: String,
}

impl Sink {
    /// Open `path` for writing (truncating), or stdout for `None` / `-`.
    pub fn open(path: Option<&Path>) -> Result<Self, RunError> {
        match path {
            None => Ok(Self::stdout()),
            Some(p) if p.as_os_str() == "-" => Ok(Self::stdout()),
            Some(p) => {
                let label = p.display().to_string();
                let file = File::create(p).map_err(|source| RunError::SinkOpen {
                    target: label.clone(),
                    source,
                })?;
                debug!(target_file = %label, "opened out file");
                Ok(Self {
                    writer: Box::new(BufWriter::new(file)),
                    label,
                })
            }
        }
    }

    pub fn stdout() -> Self {
        Self {
            writer: Box::new(io::stdout()),
            label: STDOUT_LABEL.to_string(),
        }
    }

    /// Wrap an arbitrary writer (tests, pipes).
    pub fn from_writer(writer: Box<dyn Write + Send>, label: impl Into<String>) -> Self {
        Self {
            writer,
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Serialize `envelope` and write it in one piece.
    ///
    /// Returns the bytes that were written.
    pub fn write_envelope(&mut self, envelope: &Envelope) -> Result<Vec<u8>, RunError> {
        let bytes = serde_json::to_vec(envelope).map_err(RunError::EnvelopeMarshal)?;
        self.writer
            .write_all(&bytes)
            .and_then(|()| self.writer.flush())
            .map_err(|source| RunError::SinkWrite {
                target: self.label.clone(),
                source,
            })?;
        debug!(target_file = %self.label, bytes = bytes.len(), "wrote envelope");
        Ok(bytes)
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink").field("label", &self.label).finish()
    }
}
