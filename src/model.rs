//! Core data types shared across the archive and restore pipelines.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use time::OffsetDateTime;

/// Storage class targeted by an archive operation.
///
/// The all-files CSV is always uploaded as `IntelligentTiering` regardless
/// of the folder's target class (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum StorageClass {
    #[strum(serialize = "DEEP_ARCHIVE")]
    #[serde(rename = "DEEP_ARCHIVE")]
    DeepArchive,
    #[strum(serialize = "GLACIER")]
    #[serde(rename = "GLACIER")]
    Glacier,
    #[strum(serialize = "INTELLIGENT_TIERING")]
    #[serde(rename = "INTELLIGENT_TIERING")]
    IntelligentTiering,
}

impl StorageClass {
    /// Whether reads from this class require an out-of-band restore request.
    pub fn is_glacier_tier(self) -> bool {
        matches!(self, StorageClass::Glacier | StorageClass::DeepArchive)
    }
}

/// Retrieval speed/cost tier for a glacier restore request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum RetrievalTier {
    Bulk,
    Standard,
    Expedited,
}

/// Whether an archive entry covers just its own folder, or every descendant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveMode {
    Single,
    Recursive,
}

/// A `:s3:<bucket>/<prefix>/<mirrored-absolute-path>` remote location.
///
/// See §6: a leading `/` on the local path is collapsed when concatenated
/// with `<prefix>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUri(pub String);

impl RemoteUri {
    pub fn new(bucket: &str, prefix: &str, mirrored_path: &str) -> Self {
        let mirrored = mirrored_path.trim_start_matches('/');
        let prefix = prefix.trim_matches('/');
        let joined = if prefix.is_empty() {
            mirrored.to_string()
        } else {
            format!("{prefix}/{mirrored}")
        };
        RemoteUri(format!(":s3:{bucket}/{joined}"))
    }

    /// Append a relative path tail, used when restoring a sub-tree of a
    /// recursive archive (§4.10 step 3).
    pub fn join(&self, tail: &str) -> Self {
        let base = self.0.trim_end_matches('/');
        let tail = tail.trim_matches('/');
        if tail.is_empty() {
            RemoteUri(format!("{base}/"))
        } else {
            RemoteUri(format!("{base}/{tail}/"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One record in the persistent archive registry (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub local_folder: String,
    pub archive_folder: RemoteUri,
    pub storage_class: StorageClass,
    pub profile: String,
    pub archive_mode: ArchiveMode,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp_archive: OffsetDateTime,
    pub user: String,
    /// Opaque grant/accounting metadata; the core never interprets this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_info: Option<serde_json::Value>,
}
