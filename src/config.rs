//! Explicit configuration record.
//!
//! The original Python implementation builds this up interactively,
//! prompting the user and mutating a shared config object as it goes. Per
//! the redesign note in `spec.md` §9, that whole chain is lifted out of the
//! core: the CLI (or any other caller) is responsible for producing a
//! `FrosterConfig` however it likes, and every orchestrator takes one as a
//! plain argument.

use serde::{Deserialize, Serialize};

use crate::model::StorageClass;

/// Default floor for hashing/upload parallelism (§5).
pub const MIN_CORES: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrosterConfig {
    pub bucket: String,
    pub prefix: String,
    pub profile: String,
    pub default_storage_class: StorageClass,
    /// Requested parallelism; effective pool size is `max(MIN_CORES, cores)`.
    pub cores: usize,
    pub small_file_threshold_kib: u64,
    pub pack_small_files: bool,
    pub hotspots_dir: std::path::PathBuf,
    pub skip_dir_names: Vec<String>,
    /// Directory/mtime-age buckets (days) used by the indexer (§4.5).
    pub age_buckets_days: Vec<u64>,
    /// Printed into `Where-did-the-files-go.txt` as a contact point for
    /// whoever finds the archived folder empty (§4.11).
    pub contact_email: String,
}

impl FrosterConfig {
    pub fn effective_cores(&self) -> usize {
        self.cores.max(MIN_CORES)
    }
}

impl Default for FrosterConfig {
    fn default() -> Self {
        FrosterConfig {
            bucket: String::new(),
            prefix: "froster".to_string(),
            profile: "default".to_string(),
            default_storage_class: StorageClass::DeepArchive,
            cores: MIN_CORES,
            small_file_threshold_kib: 1024,
            pack_small_files: true,
            hotspots_dir: std::path::PathBuf::from("."),
            skip_dir_names: vec![".snapshot".to_string()],
            age_buckets_days: vec![5475, 3650, 1825, 1095, 730, 365, 90, 30],
            contact_email: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_cores_floors_at_min() {
        let mut cfg = FrosterConfig::default();
        cfg.cores = 1;
        assert_eq!(cfg.effective_cores(), MIN_CORES);
        cfg.cores = 16;
        assert_eq!(cfg.effective_cores(), 16);
    }
}
