//! File-system snapshots shared by the material and product attestors.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{AttestorError, DigestSet};

const READ_BUF_SIZE: usize = 64 * 1024;

/// Validate a glob pattern at configuration time.
pub(crate) fn check_glob(key: &str, pattern: &str) -> Result<(), AttestorError> {
    Glob::new(pattern)
        .map(|_| ())
        .map_err(|e| AttestorError::invalid(key, pattern, e.to_string()))
}

/// Compile patterns; an empty list matches nothing.
pub(crate) fn build_globset(patterns: &[String]) -> Result<GlobSet, AttestorError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).map_err(|e| AttestorError::invalid("glob", pattern, e.to_string()))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| AttestorError::invalid("glob", &patterns.join(","), e.to_string()))
}

/// SHA-256 of a file, streamed.
pub fn digest_file(path: &Path) -> Result<DigestSet, AttestorError> {
    let mut file = File::open(path).map_err(|e| AttestorError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| AttestorError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let mut set = DigestSet::new();
    set.insert("sha256".to_string(), hex::encode(hasher.finalize()));
    Ok(set)
}

/// Digest every regular file under `root`.
///
/// Keys are `/`-separated paths relative to `root`. Directory symlinks are
/// not followed; symlinks to files are digested by target content.
pub fn record_artifacts(
    root: &Path,
    select: &dyn Fn(&str) -> bool,
) -> Result<BTreeMap<String, DigestSet>, AttestorError> {
    let mut out = BTreeMap::new();
    walk(root, root, select, &mut out)?;
    debug!(root = %root.display(), files = out.len(), "recorded artifacts");
    Ok(out)
}

fn walk(
    root: &Path,
    dir: &Path,
    select: &dyn Fn(&str) -> bool,
    out: &mut BTreeMap<String, DigestSet>,
) -> Result<(), AttestorError> {
    let entries = std::fs::read_dir(dir).map_err(|e| AttestorError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| AttestorError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| AttestorError::io(&path, e))?;

        let is_file = if file_type.is_symlink() {
            match std::fs::metadata(&path) {
                Ok(meta) => meta.is_file(),
                // dangling
                Err(_) => false,
            }
        } else {
            file_type.is_file()
        };

        if file_type.is_dir() {
            walk(root, &path, select, out)?;
        } else if is_file {
            let rel = relative_name(root, &path);
            if select(&rel) {
                out.insert(rel, digest_file(&path)?);
            }
        }
    }
    Ok(())
}

fn relative_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
