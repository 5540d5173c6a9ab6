//! Path canonicalization, permission probing, and recursive-collision
//! detection (§4.1).

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};

/// Resolve symlinks and `~` tokens, and strip trailing separators.
///
/// Tolerates a path whose leaf doesn't exist yet (a restore target that was
/// previously deleted): the nearest existing ancestor is resolved and the
/// missing tail is appended unresolved, the way `realpath` degrades.
pub fn canonicalize(path: &Path) -> Result<PathBuf> {
    let expanded = expand_home(path);
    match fs::canonicalize(&expanded) {
        Ok(resolved) => Ok(resolved),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => canonicalize_missing(&expanded),
        Err(e) => Err(Error::InvalidInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

fn canonicalize_missing(path: &Path) -> Result<PathBuf> {
    let mut tail = Vec::new();
    let mut cursor = path;
    loop {
        let Some(parent) = cursor.parent() else {
            return Err(Error::InvalidInput {
                path: path.to_path_buf(),
                reason: "no existing ancestor found".to_string(),
            });
        };
        tail.push(cursor.file_name().map(|n| n.to_os_string()).unwrap_or_default());
        if parent.exists() {
            let mut resolved = fs::canonicalize(parent).map_err(|e| Error::InvalidInput {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            for component in tail.into_iter().rev() {
                resolved.push(component);
            }
            return Ok(resolved);
        }
        cursor = parent;
    }
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadWrite {
    pub readable: bool,
    pub writable: bool,
}

impl ReadWrite {
    pub fn usable(self) -> bool {
        self.readable && self.writable
    }
}

/// Probe whether a single path is readable/writable.
///
/// A directory is usable iff it can be read (listed) and a temp file can be
/// created and removed inside it.
pub fn probe_read_write(path: &Path) -> ReadWrite {
    if path.is_dir() {
        let readable = fs::read_dir(path).is_ok();
        let probe = path.join(format!(".froster-probe-{}", std::process::id()));
        let writable = fs::File::create(&probe)
            .map(|_| {
                let _ = fs::remove_file(&probe);
                true
            })
            .unwrap_or(false);
        ReadWrite { readable, writable }
    } else {
        let readable = fs::File::open(path).is_ok();
        let writable = fs::OpenOptions::new().write(true).open(path).is_ok();
        ReadWrite { readable, writable }
    }
}

/// Probe a directory and every descendant directory and regular file.
///
/// Used by recursive operations, which require read/write across the whole
/// sub-tree, not just the root.
pub fn probe_read_write_recursive(root: &Path) -> ReadWrite {
    let mut result = probe_read_write(root);
    if !result.usable() {
        return result;
    }
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let rw = probe_read_write(entry.path());
        result.readable &= rw.readable;
        result.writable &= rw.writable;
        if !result.usable() {
            break;
        }
    }
    result
}

/// True iff any pair of folders shares a common path equal to, or an
/// ancestor of, the other (§4.1, §8).
pub fn detect_recursive_collision(folders: &[PathBuf]) -> Option<(PathBuf, PathBuf)> {
    for (i, a) in folders.iter().enumerate() {
        for b in &folders[i + 1..] {
            if is_ancestor_or_equal(a, b) || is_ancestor_or_equal(b, a) {
                return Some((a.clone(), b.clone()));
            }
        }
    }
    None
}

fn is_ancestor_or_equal(ancestor: &Path, descendant: &Path) -> bool {
    descendant.starts_with(ancestor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_detects_ancestor_pair() {
        let folders = vec![
            PathBuf::from("/data/x"),
            PathBuf::from("/data/x/y/z"),
            PathBuf::from("/data/other"),
        ];
        let found = detect_recursive_collision(&folders);
        assert!(found.is_some());
    }

    #[test]
    fn collision_none_for_siblings() {
        let folders = vec![PathBuf::from("/data/x"), PathBuf::from("/data/xx")];
        assert!(detect_recursive_collision(&folders).is_none());
    }

    #[test]
    fn collision_equal_paths_collide() {
        let folders = vec![PathBuf::from("/data/x"), PathBuf::from("/data/x")];
        assert!(detect_recursive_collision(&folders).is_some());
    }

    #[test]
    fn canonicalize_tolerates_a_not_yet_created_leaf() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("not-created-yet");
        let resolved = canonicalize(&target).unwrap();
        assert_eq!(resolved.file_name().unwrap(), "not-created-yet");
        assert_eq!(resolved.parent().unwrap(), fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn probe_read_write_tempdir_is_usable() {
        let dir = tempfile::tempdir().unwrap();
        let rw = probe_read_write(dir.path());
        assert!(rw.usable());
    }
}
