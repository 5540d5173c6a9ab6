//! Glacier restore-request orchestration (§4.7).

use crate::errors::Result;
use crate::model::{RetrievalTier, StorageClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreClass {
    NotGlacier,
    Triggered,
    InProgress,
    Ready,
}

#[derive(Debug, Clone)]
pub struct ObjectStatus {
    pub key: String,
    pub storage_class: StorageClass,
    pub restore_in_progress: bool,
    pub restore_ready: bool,
}

/// Narrow interface to object metadata and restore requests, so the
/// classification logic below can be tested against a fake without a real
/// bucket.
pub trait GlacierBackend {
    fn list_keys(&self, prefix: &str, recursive: bool) -> Result<Vec<String>>;
    fn head(&self, key: &str) -> Result<ObjectStatus>;
    /// Issue a restore request; `Ok(false)` means the service reported
    /// `RestoreAlreadyInProgress`, not a hard error.
    fn request_restore(&self, key: &str, tier: RetrievalTier, retention_days: u32) -> Result<bool>;
}

#[derive(Debug, Default, Clone)]
pub struct RestoreRequestResult {
    pub triggered: Vec<String>,
    pub in_progress: Vec<String>,
    pub ready: Vec<String>,
    pub not_glacier: Vec<String>,
}

impl RestoreRequestResult {
    /// `len(triggered) + len(in_progress)`: caller policy is to treat a
    /// nonzero count as "pending" and defer the download (§4.7, §8).
    pub fn pending_count(&self) -> usize {
        self.triggered.len() + self.in_progress.len()
    }

    pub fn is_pending(&self) -> bool {
        self.pending_count() > 0
    }
}

/// Enumerate keys under `prefix`, classify each, and issue restore requests
/// for anything glacier-tier that isn't already in progress or ready.
///
/// If `recursive` is false, keys whose remaining suffix (after `prefix`)
/// contains a path separator are skipped (§4.7 step 1).
pub fn restore_and_classify(
    backend: &dyn GlacierBackend,
    prefix: &str,
    tier: RetrievalTier,
    retention_days: u32,
    recursive: bool,
) -> Result<RestoreRequestResult> {
    let keys = backend.list_keys(prefix, recursive)?;
    let mut result = RestoreRequestResult::default();

    for key in keys {
        if !recursive && suffix_has_separator(prefix, &key) {
            continue;
        }
        let status = backend.head(&key)?;
        if !status.storage_class.is_glacier_tier() {
            result.not_glacier.push(key);
            continue;
        }
        if status.restore_ready {
            result.ready.push(key);
            continue;
        }
        if status.restore_in_progress {
            result.in_progress.push(key);
            continue;
        }
        match backend.request_restore(&key, tier, retention_days) {
            Ok(true) => result.triggered.push(key),
            Ok(false) => result.in_progress.push(key),
            Err(e) => return Err(e),
        }
    }

    Ok(result)
}

fn suffix_has_separator(prefix: &str, key: &str) -> bool {
    key.strip_prefix(prefix)
        .unwrap_or(key)
        .trim_start_matches('/')
        .contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeBackend {
        objects: HashMap<String, ObjectStatus>,
        already_in_progress: RefCell<Vec<String>>,
    }

    impl GlacierBackend for FakeBackend {
        fn list_keys(&self, prefix: &str, _recursive: bool) -> Result<Vec<String>> {
            Ok(self
                .objects
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }

        fn head(&self, key: &str) -> Result<ObjectStatus> {
            Ok(self.objects.get(key).cloned().unwrap())
        }

        fn request_restore(&self, key: &str, _tier: RetrievalTier, _retention_days: u32) -> Result<bool> {
            if self.already_in_progress.borrow().contains(&key.to_string()) {
                Ok(false)
            } else {
                Ok(true)
            }
        }
    }

    fn status(key: &str, class: StorageClass, in_progress: bool, ready: bool) -> (String, ObjectStatus) {
        (
            key.to_string(),
            ObjectStatus {
                key: key.to_string(),
                storage_class: class,
                restore_in_progress: in_progress,
                restore_ready: ready,
            },
        )
    }

    #[test]
    fn classifies_four_buckets() {
        let objects = HashMap::from([
            status("p/a", StorageClass::Glacier, false, false),
            status("p/b", StorageClass::Glacier, true, false),
            status("p/c", StorageClass::Glacier, false, true),
            status("p/d", StorageClass::IntelligentTiering, false, false),
        ]);
        let backend = FakeBackend {
            objects,
            already_in_progress: RefCell::new(vec![]),
        };
        let result =
            restore_and_classify(&backend, "p/", RetrievalTier::Bulk, 30, true).unwrap();
        assert_eq!(result.triggered, vec!["p/a".to_string()]);
        assert_eq!(result.in_progress, vec!["p/b".to_string()]);
        assert_eq!(result.ready, vec!["p/c".to_string()]);
        assert_eq!(result.not_glacier, vec!["p/d".to_string()]);
        assert_eq!(result.pending_count(), 2);
    }

    #[test]
    fn non_recursive_skips_nested_keys() {
        let objects = HashMap::from([
            status("p/a", StorageClass::Glacier, false, true),
            status("p/sub/b", StorageClass::Glacier, false, true),
        ]);
        let backend = FakeBackend {
            objects,
            already_in_progress: RefCell::new(vec![]),
        };
        let result =
            restore_and_classify(&backend, "p/", RetrievalTier::Bulk, 30, false).unwrap();
        assert_eq!(result.ready, vec!["p/a".to_string()]);
    }

    #[test]
    fn already_in_progress_is_not_an_error() {
        let objects = HashMap::from([status("p/a", StorageClass::Glacier, false, false)]);
        let backend = FakeBackend {
            objects,
            already_in_progress: RefCell::new(vec!["p/a".to_string()]),
        };
        let result =
            restore_and_classify(&backend, "p/", RetrievalTier::Bulk, 30, true).unwrap();
        assert_eq!(result.in_progress, vec!["p/a".to_string()]);
        assert!(result.triggered.is_empty());
    }
}
