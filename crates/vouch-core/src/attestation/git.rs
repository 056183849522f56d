//! Git attestor: commit and branch of the repository enclosing the working
//! directory, read straight from the `.git` metadata.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AttestationContext, Attestor, AttestorError, RunType};

pub const TYPE: &str = "git";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitClaim {
    pub commit_hash: String,
    /// `None` for a detached HEAD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[derive(Debug, Default)]
pub struct GitAttestor {
    claim: Option<GitClaim>,
}

impl GitAttestor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Attestor for GitAttestor {
    fn attestor_type(&self) -> &str {
        TYPE
    }

    fn run_type(&self) -> RunType {
        RunType::PreMaterial
    }

    async fn attest(&mut self, ctx: &mut AttestationContext) -> Result<(), AttestorError> {
        let git_dir = find_git_dir(ctx.working_dir())?;
        self.claim = Some(read_head(&git_dir)?);
        Ok(())
    }

    fn claim(&self) -> Result<serde_json::Value, AttestorError> {
        let claim = self.claim.as_ref().ok_or(AttestorError::NotObserved)?;
        Ok(serde_json::to_value(claim)?)
    }
}

/// Walk up from `start` to the first `.git` directory or worktree link.
fn find_git_dir(start: &Path) -> Result<PathBuf, AttestorError> {
    let start = start
        .canonicalize()
        .map_err(|e| AttestorError::io(start, e))?;

    for dir in start.ancestors() {
        let candidate = dir.join(".git");
        if candidate.is_dir() {
            return Ok(candidate);
        }
        if candidate.is_file() {
            // worktrees and submodules: "gitdir: <path>"
            let text = read(&candidate)?;
            let target = text
                .trim()
                .strip_prefix("gitdir:")
                .ok_or_else(|| AttestorError::GitMetadata {
                    reason: format!("unexpected contents in {}", candidate.display()),
                })?
                .trim();
            return Ok(dir.join(target));
        }
    }

    Err(AttestorError::NotARepository { path: start })
}

fn read_head(git_dir: &Path) -> Result<GitClaim, AttestorError> {
    let head = read(&git_dir.join("HEAD"))?;
    let head = head.trim();

    let Some(reference) = head.strip_prefix("ref:").map(str::trim) else {
        return Ok(GitClaim {
            commit_hash: validate_hash(head)?,
            branch: None,
        });
    };

    let branch = reference
        .strip_prefix("refs/heads/")
        .unwrap_or(reference)
        .to_string();
    let commit_hash = resolve_ref(git_dir, reference)?;
    Ok(GitClaim {
        commit_hash,
        branch: Some(branch),
    })
}

fn resolve_ref(git_dir: &Path, reference: &str) -> Result<String, AttestorError> {
    let loose = git_dir.join(reference);
    if loose.is_file() {
        return validate_hash(read(&loose)?.trim());
    }

    // worktrees keep refs in the common dir
    let common = match std::fs::read_to_string(git_dir.join("commondir")) {
        Ok(rel) => git_dir.join(rel.trim()),
        Err(_) => git_dir.to_path_buf(),
    };
    let loose = common.join(reference);
    if loose.is_file() {
        return validate_hash(read(&loose)?.trim());
    }

    let packed_path = common.join("packed-refs");
    if packed_path.is_file() {
        let packed = read(&packed_path)?;
        for line in packed.lines() {
            if line.starts_with('#') || line.starts_with('^') {
                continue;
            }
            if let Some((hash, name)) = line.split_once(' ') {
                if name.trim() == reference {
                    return validate_hash(hash);
                }
            }
        }
    }

    Err(AttestorError::GitMetadata {
        reason: format!("cannot resolve {reference} (repository without commits?)"),
    })
}

fn validate_hash(hash: &str) -> Result<String, AttestorError> {
    let ok = matches!(hash.len(), 40 | 64) && hash.chars().all(|c| c.is_ascii_hexdigit());
    if ok {
        Ok(hash.to_ascii_lowercase())
    } else {
        Err(AttestorError::GitMetadata {
            reason: format!("'{hash}' is not an object id"),
        })
    }
}

fn read(path: &Path) -> Result<String, AttestorError> {
    std::fs::read_to_string(path).map_err(|e| AttestorError::io(path, e))
}
