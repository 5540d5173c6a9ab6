//! Persistent archive registry (§3, §4.8).
//!
//! A single JSON document mapping absolute folder path to `ArchiveEntry`.
//! Writes are whole-file replacements; the registry does not coordinate
//! concurrent writers itself (§5) — callers serialize archive operations
//! against the same registry file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};
use crate::model::{ArchiveEntry, ArchiveMode};

/// Outcome of attempting to read the registry, distinguishing "never
/// written" from "unreadable" — the REDESIGN FLAG resolved in DESIGN.md:
/// the original silently collapses both into "no entry".
#[derive(Debug)]
pub enum RegistryRead {
    Missing,
    Corrupt { reason: String },
    Parsed(BTreeMap<String, ArchiveEntry>),
}

pub struct Registry {
    path: PathBuf,
}

impl Registry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Registry { path: path.into() }
    }

    fn read(&self) -> RegistryRead {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return RegistryRead::Missing,
            Err(e) => return RegistryRead::Corrupt { reason: e.to_string() },
        };
        match serde_json::from_str::<BTreeMap<String, ArchiveEntry>>(&text) {
            Ok(map) => RegistryRead::Parsed(map),
            Err(e) => RegistryRead::Corrupt { reason: e.to_string() },
        }
    }

    /// Write `entry` under `folder`, loading the existing document first
    /// (treating "missing" as an empty map). Refuses to clobber a corrupt
    /// file unless `force` is set, per the corruption policy in §4.8.
    pub fn put(&self, folder: &str, entry: ArchiveEntry, force: bool) -> Result<()> {
        let mut map = match self.read() {
            RegistryRead::Missing => BTreeMap::new(),
            RegistryRead::Parsed(map) => map,
            RegistryRead::Corrupt { reason } if force => {
                tracing::warn!(path = ?self.path, %reason, "overwriting corrupt registry");
                BTreeMap::new()
            }
            RegistryRead::Corrupt { reason } => {
                return Err(Error::RegistryCorrupt {
                    path: self.path.clone(),
                    reason,
                })
            }
        };
        map.insert(folder.to_string(), entry);
        self.write(&map)
    }

    fn write(&self, map: &BTreeMap<String, ArchiveEntry>) -> Result<()> {
        let text = serde_json::to_string_pretty(map).expect("archive entries always serialize");
        std::fs::write(&self.path, text).map_err(|e| Error::io(&self.path, e))
    }

    /// Direct entry for `folder` if present; otherwise the nearest ancestor
    /// whose `archive_mode` is `Recursive` (§4.8, §8).
    ///
    /// A corrupt or missing registry degrades to "no entry" rather than
    /// erroring, matching the original's read-side corruption policy.
    pub fn get(&self, folder: &Path) -> Option<ArchiveEntry> {
        let map = match self.read() {
            RegistryRead::Parsed(map) => map,
            RegistryRead::Missing => return None,
            RegistryRead::Corrupt { reason } => {
                tracing::warn!(path = ?self.path, %reason, "registry unreadable, treating as no entry");
                return None;
            }
        };
        if let Some(entry) = map.get(&folder.to_string_lossy().into_owned()) {
            return Some(entry.clone());
        }
        // The nearest ancestor entry decides coverage outright: a Recursive
        // one covers `folder`, anything else (Single) does not, and either
        // way a more distant ancestor never gets a turn (§8).
        for ancestor in folder.ancestors().skip(1) {
            if let Some(entry) = map.get(&ancestor.to_string_lossy().into_owned()) {
                return if matches!(entry.archive_mode, ArchiveMode::Recursive) {
                    Some(entry.clone())
                } else {
                    None
                };
            }
        }
        None
    }

    /// True iff `folder` has an entry exactly matching its own path (used
    /// by the archive orchestrator's "already archived" guard, which must
    /// not trigger on mere recursive coverage by an ancestor).
    pub fn has_exact_entry(&self, folder: &Path) -> bool {
        match self.read() {
            RegistryRead::Parsed(map) => map.contains_key(&folder.to_string_lossy().into_owned()),
            _ => false,
        }
    }

    /// Stable sort by `timestamp` descending, projecting the given columns.
    pub fn to_csv(&self, columns: &[&str]) -> Result<String> {
        let map = match self.read() {
            RegistryRead::Parsed(map) => map,
            RegistryRead::Missing => BTreeMap::new(),
            RegistryRead::Corrupt { reason } => {
                return Err(Error::RegistryCorrupt {
                    path: self.path.clone(),
                    reason,
                })
            }
        };
        let mut entries: Vec<(&String, &ArchiveEntry)> = map.iter().collect();
        entries.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp));

        let mut out = String::from(columns.join(","));
        out.push('\n');
        for (folder, entry) in entries {
            let row: Vec<String> = columns.iter().map(|c| project(folder, entry, c)).collect();
            out.push_str(&row.join(","));
            out.push('\n');
        }
        Ok(out)
    }
}

fn project(folder: &str, entry: &ArchiveEntry, column: &str) -> String {
    match column {
        "local_folder" => folder.to_string(),
        "archive_folder" => entry.archive_folder.to_string(),
        "storage_class" => entry.storage_class.to_string(),
        "profile" => entry.profile.clone(),
        "archive_mode" => format!("{:?}", entry.archive_mode),
        "timestamp" => entry.timestamp.to_string(),
        "user" => entry.user.clone(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RemoteUri, StorageClass};
    use time::OffsetDateTime;

    fn sample_entry(mode: ArchiveMode) -> ArchiveEntry {
        ArchiveEntry {
            local_folder: "/data/x".to_string(),
            archive_folder: RemoteUri::new("b", "p", "/data/x"),
            storage_class: StorageClass::DeepArchive,
            profile: "default".to_string(),
            archive_mode: mode,
            timestamp: OffsetDateTime::UNIX_EPOCH,
            timestamp_archive: OffsetDateTime::UNIX_EPOCH,
            user: "alice".to_string(),
            grant_info: None,
        }
    }

    #[test]
    fn recursive_entry_covers_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path().join("registry.json"));
        registry
            .put("/data/x", sample_entry(ArchiveMode::Recursive), false)
            .unwrap();

        assert!(registry.get(Path::new("/data/x/y")).is_some());
        assert!(registry.get(Path::new("/data/x/y/z")).is_some());
        assert!(registry.get(Path::new("/unrelated")).is_none());
    }

    #[test]
    fn single_entry_does_not_cover_children() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path().join("registry.json"));
        registry
            .put("/data/x", sample_entry(ArchiveMode::Single), false)
            .unwrap();

        assert!(registry.get(Path::new("/data/x")).is_some());
        assert!(registry.get(Path::new("/data/x/y")).is_none());
    }

    #[test]
    fn single_ancestor_blocks_a_more_distant_recursive_one() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path().join("registry.json"));
        registry
            .put("/data", sample_entry(ArchiveMode::Recursive), false)
            .unwrap();
        registry
            .put("/data/x", sample_entry(ArchiveMode::Single), false)
            .unwrap();

        assert!(registry.get(Path::new("/data/x")).is_some());
        assert!(registry.get(Path::new("/data/x/y")).is_none());
        assert!(registry.get(Path::new("/data/other")).is_some());
    }

    #[test]
    fn missing_registry_reads_as_no_entry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path().join("nonexistent.json"));
        assert!(registry.get(Path::new("/data/x")).is_none());
    }

    #[test]
    fn corrupt_registry_refuses_write_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, "{ not json").unwrap();
        let registry = Registry::new(&path);
        let result = registry.put("/data/x", sample_entry(ArchiveMode::Single), false);
        assert!(matches!(result, Err(Error::RegistryCorrupt { .. })));
        assert!(registry.get(Path::new("/data/x")).is_none());
    }
}
