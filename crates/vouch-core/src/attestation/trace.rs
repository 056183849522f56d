//! Process-tree observation through procfs.
//!
//! The command-run attestor polls `/proc` while its child runs and keeps
//! every descendant it sees. Short-lived processes that start and exit
//! between two polls are not observed.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// One observed process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    /// Name from `/proc/<pid>/status`.
    pub program: String,
    pub cmdline: Vec<String>,
}

/// Scan `proc_root` for `root_pid` and all of its descendants.
///
/// Entries that vanish or cannot be read mid-scan are skipped.
pub fn scan_process_tree(proc_root: &Path, root_pid: u32) -> std::io::Result<Vec<ProcessInfo>> {
    let mut all: BTreeMap<u32, ProcessInfo> = BTreeMap::new();

    for entry in std::fs::read_dir(proc_root)? {
        let Ok(entry) = entry else { continue };
        let name = entry.file_name();
        let pid: u32 = match name.to_string_lossy().parse() {
            Ok(p) if p > 0 => p,
            _ => continue,
        };
        if let Some(info) = read_process(proc_root, pid) {
            all.insert(pid, info);
        }
    }

    let mut children: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for info in all.values() {
        children.entry(info.ppid).or_default().push(info.pid);
    }

    let mut seen = BTreeSet::new();
    let mut queue = vec![root_pid];
    let mut out = Vec::new();
    while let Some(pid) = queue.pop() {
        if !seen.insert(pid) {
            continue;
        }
        if let Some(info) = all.remove(&pid) {
            out.push(info);
        }
        if let Some(kids) = children.get(&pid) {
            queue.extend(kids.iter().copied());
        }
    }
    out.sort_by_key(|p| p.pid);
    Ok(out)
}

fn read_process(proc_root: &Path, pid: u32) -> Option<ProcessInfo> {
    let dir = proc_root.join(pid.to_string());
    let status = std::fs::read_to_string(dir.join("status")).ok()?;

    let mut program = String::new();
    let mut ppid = None;
    for line in status.lines() {
        if let Some(v) = line.strip_prefix("Name:") {
            program = v.trim().to_string();
        } else if let Some(v) = line.strip_prefix("PPid:") {
            ppid = v.trim().parse().ok();
        }
    }

    let cmdline = std::fs::read(dir.join("cmdline"))
        .map(|raw| {
            raw.split(|b| *b == 0)
                .filter(|part| !part.is_empty())
                .map(|part| String::from_utf8_lossy(part).into_owned())
                .collect()
        })
        .unwrap_or_default();

    Some(ProcessInfo {
        pid,
        ppid: ppid?,
        program,
        cmdline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_proc(root: &Path, pid: u32, ppid: u32, name: &str, argv: &[&str]) {
        let dir = root.join(pid.to_string());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("status"),
            format!("Name:\t{name}\nState:\tS (sleeping)\nPPid:\t{ppid}\n"),
        )
        .unwrap();
        let mut cmdline = argv.join("\0");
        cmdline.push('\0');
        std::fs::write(dir.join("cmdline"), cmdline).unwrap();
    }

    #[test]
    fn test_collects_root_and_descendants_only() {
        let proc_root = TempDir::new().unwrap();
        fake_proc(proc_root.path(), 1, 0, "init", &["/sbin/init"]);
        fake_proc(proc_root.path(), 100, 1, "make", &["make", "all"]);
        fake_proc(proc_root.path(), 101, 100, "cc", &["cc", "-c", "main.c"]);
        fake_proc(proc_root.path(), 102, 101, "as", &["as"]);
        fake_proc(proc_root.path(), 200, 1, "sshd", &["sshd"]);
        std::fs::create_dir_all(proc_root.path().join("self")).unwrap();

        let tree = scan_process_tree(proc_root.path(), 100).unwrap();
        let pids: Vec<_> = tree.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![100, 101, 102]);
        assert_eq!(tree[1].cmdline, vec!["cc", "-c", "main.c"]);
        assert_eq!(tree[1].program, "cc");
    }

    #[test]
    fn test_unreadable_entries_are_skipped() {
        let proc_root = TempDir::new().unwrap();
        fake_proc(proc_root.path(), 100, 1, "make", &["make"]);
        std::fs::create_dir_all(proc_root.path().join("101")).unwrap();

        let tree = scan_process_tree(proc_root.path(), 100).unwrap();
        assert_eq!(tree.len(), 1);
    }
}
