//! Archive orchestrator (§4.9): validate → pack → manifest → upload →
//! verify → register.

use std::path::Path;

use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::checksum;
use crate::config::FrosterConfig;
use crate::copier::{Copier, CopyOptions, Depth};
use crate::errors::{Error, Result};
use crate::meta::{self, ALLFILES_CSV_FILENAME, MANIFEST_FILENAME};
use crate::model::{ArchiveEntry, ArchiveMode, RemoteUri, StorageClass};
use crate::orchestrator::reset;
use crate::packer;
use crate::pathutil;
use crate::registry::Registry;
use crate::walker;

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub storage_class: StorageClass,
    pub recursive: bool,
    pub force: bool,
    pub user: String,
    pub now: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived { archive_folder: String },
    SkippedEmpty,
}

/// Archive `folder` according to `options`. When `options.recursive` is
/// set, every directory in the tree is archived in turn, but only the root
/// receives a registry entry, tagged `Recursive` (§4.9).
#[instrument(skip(registry, copier, config), fields(folder = %folder.display()))]
pub fn archive_folder(
    folder: &Path,
    config: &FrosterConfig,
    options: &ArchiveOptions,
    registry: &Registry,
    copier: &dyn Copier,
) -> Result<ArchiveOutcome> {
    let folder_buf = pathutil::canonicalize(folder)?;
    let folder = folder_buf.as_path();

    if registry.has_exact_entry(folder) {
        let existing = registry.get(folder).expect("has_exact_entry implies get");
        return Err(Error::AlreadyArchived {
            folder: folder.to_path_buf(),
            archive_folder: existing.archive_folder.to_string(),
        });
    }

    let outcome = archive_one(folder, config, options, copier)?;

    if options.recursive {
        let skip_names: std::collections::HashSet<std::ffi::OsString> = config
            .skip_dir_names
            .iter()
            .map(std::ffi::OsString::from)
            .collect();
        let entries = walker::walk(folder, &skip_names, |path, e| {
            warn!(path = %path.display(), error = %e, "failed to stat entry during recursive archive walk");
        });
        for entry in &entries {
            if entry.dir == folder {
                continue;
            }
            match archive_one(&entry.dir, config, options, copier) {
                Ok(_) => {}
                Err(Error::AlreadyPrepared { .. }) | Err(Error::PermissionDenied { .. }) => {
                    // A sub-folder already mid-attempt, or unreadable: skip it,
                    // the top-level archive still proceeds (§7: batch
                    // continues past a single failure).
                    warn!(dir = %entry.dir.display(), "skipping sub-folder in recursive archive");
                }
                Err(e) => return Err(e),
            }
        }
    }

    if let ArchiveOutcome::Archived { archive_folder } = &outcome {
        let mode = if options.recursive {
            ArchiveMode::Recursive
        } else {
            ArchiveMode::Single
        };
        let entry = ArchiveEntry {
            local_folder: folder.to_string_lossy().into_owned(),
            archive_folder: RemoteUri(archive_folder.clone()),
            storage_class: options.storage_class,
            profile: config.profile.clone(),
            archive_mode: mode,
            timestamp: options.now,
            timestamp_archive: options.now,
            user: options.user.clone(),
            grant_info: None,
        };
        registry.put(&entry.local_folder, entry, false)?;
        info!(archive_folder = %archive_folder, "archived and registered");
    }

    Ok(outcome)
}

/// Steps 2–9 for a single directory, with no registry write (the caller
/// decides whether this directory is the one that gets an entry).
fn archive_one(
    folder: &Path,
    config: &FrosterConfig,
    options: &ArchiveOptions,
    copier: &dyn Copier,
) -> Result<ArchiveOutcome> {
    let manifest_path = folder.join(MANIFEST_FILENAME);
    if manifest_path.exists() {
        if !options.force {
            return Err(Error::AlreadyPrepared {
                folder: folder.to_path_buf(),
            });
        }
        reset::reset_folder(folder)?;
    }

    if let Some(collision) = meta::find_reserved_name_collision(folder).map_err(|e| Error::io(folder, e))? {
        return Err(Error::InvalidInput {
            path: collision,
            reason: "file name collides with froster's reserved meta-file set".to_string(),
        });
    }

    if is_empty_of_real_content(folder)? {
        return Ok(ArchiveOutcome::SkippedEmpty);
    }

    packer::pack(folder, config.small_file_threshold_kib, config.pack_small_files)?;

    let pool = checksum::build_pool(config.effective_cores())?;
    checksum::compute_manifest(folder, MANIFEST_FILENAME, &pool)?;

    let remote = RemoteUri::new(&config.bucket, &config.prefix, &folder.to_string_lossy());

    // The small-files tar is the packed payload and must be uploaded; only
    // the bookkeeping files are excluded (the original's rclone invocation
    // excludes exactly these four, leaving the tar to transfer normally).
    let upload_options = CopyOptions {
        depth: Depth::One,
        follow_symlinks: true,
        excludes: vec![
            meta::MANIFEST_FILENAME.to_string(),
            meta::RESTORED_MANIFEST_FILENAME.to_string(),
            meta::ALLFILES_CSV_FILENAME.to_string(),
            meta::WHERE_DID_IT_GO_FILENAME.to_string(),
        ],
        storage_class_override: Some(options.storage_class),
    };
    let report = copier.copy(folder, remote.as_str(), &upload_options)?;
    if !report.success() {
        return Err(Error::UploadFailed {
            folder: folder.to_path_buf(),
            archive_folder: remote.to_string(),
            reason: format!("{} error(s) during upload", report.errors),
        });
    }

    let allfiles_options = CopyOptions {
        depth: Depth::One,
        follow_symlinks: true,
        excludes: vec![],
        storage_class_override: Some(StorageClass::IntelligentTiering),
    };
    let allfiles_dir = tempfile::tempdir().map_err(|e| Error::io(folder, e))?;
    let allfiles_src = folder.join(ALLFILES_CSV_FILENAME);
    let staged = allfiles_dir.path().join(ALLFILES_CSV_FILENAME);
    std::fs::copy(&allfiles_src, &staged).map_err(|e| Error::io(&allfiles_src, e))?;
    let allfiles_report = copier.copy(allfiles_dir.path(), remote.as_str(), &allfiles_options)?;
    if !allfiles_report.success() {
        return Err(Error::UploadFailed {
            folder: folder.to_path_buf(),
            archive_folder: remote.to_string(),
            reason: "failed to upload all-files CSV".to_string(),
        });
    }

    let verify = copier.verify_checksum(&manifest_path, remote.as_str(), &upload_options)?;
    if verify.mismatches > 0 {
        return Err(Error::VerificationFailed {
            folder: folder.to_path_buf(),
            archive_folder: remote.to_string(),
            mismatches: verify.mismatches,
        });
    }

    Ok(ArchiveOutcome::Archived {
        archive_folder: remote.to_string(),
    })
}

fn is_empty_of_real_content(folder: &Path) -> Result<bool> {
    let mut saw_any = false;
    for entry in std::fs::read_dir(folder).map_err(|e| Error::io(folder, e))? {
        let entry = entry.map_err(|e| Error::io(folder, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if meta::is_meta_file(&name) {
            continue;
        }
        saw_any = true;
        break;
    }
    Ok(!saw_any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copier::LocalCopier;

    fn config() -> FrosterConfig {
        let mut cfg = FrosterConfig::default();
        cfg.bucket = "bucket".to_string();
        cfg.prefix = "froster".to_string();
        cfg
    }

    fn options() -> ArchiveOptions {
        ArchiveOptions {
            storage_class: StorageClass::DeepArchive,
            recursive: false,
            force: false,
            user: "alice".to_string(),
            now: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn empty_folder_is_skipped_without_registry_entry() {
        let dir = tempfile::tempdir().unwrap();
        let remote_root = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path().join("registry.json"));
        let copier = LocalCopier::new(remote_root.path());

        let outcome =
            archive_folder(dir.path(), &config(), &options(), &registry, &copier).unwrap();
        assert_eq!(outcome, ArchiveOutcome::SkippedEmpty);
        assert!(registry.get(dir.path()).is_none());
    }

    #[test]
    fn single_archive_registers_and_uploads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), vec![0u8; 2 * 1024 * 1024]).unwrap();
        std::fs::write(dir.path().join("small.txt"), b"hi").unwrap();

        let remote_root = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path().join("registry.json"));
        let copier = LocalCopier::new(remote_root.path());

        let outcome =
            archive_folder(dir.path(), &config(), &options(), &registry, &copier).unwrap();
        assert!(matches!(outcome, ArchiveOutcome::Archived { .. }));
        assert!(registry.get(dir.path()).is_some());
        assert!(dir.path().join(MANIFEST_FILENAME).exists());
        assert!(!dir.path().join("small.txt").exists(), "small file should be packed");
    }

    #[test]
    fn already_archived_folder_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"content").unwrap();
        let remote_root = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path().join("registry.json"));
        let copier = LocalCopier::new(remote_root.path());

        archive_folder(dir.path(), &config(), &options(), &registry, &copier).unwrap();
        let result = archive_folder(dir.path(), &config(), &options(), &registry, &copier);
        assert!(matches!(result, Err(Error::AlreadyArchived { .. })));
    }

    #[test]
    fn file_colliding_with_a_reserved_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), vec![0u8; 2 * 1024 * 1024]).unwrap();
        std::fs::write(dir.path().join(ALLFILES_CSV_FILENAME), b"not froster's").unwrap();
        let remote_root = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path().join("registry.json"));
        let copier = LocalCopier::new(remote_root.path());

        let result = archive_folder(dir.path(), &config(), &options(), &registry, &copier);
        assert!(matches!(result, Err(Error::InvalidInput { .. })));
        assert!(registry.get(dir.path()).is_none());
    }

    #[test]
    fn recursive_archive_registers_only_the_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("y/z")).unwrap();
        std::fs::write(dir.path().join("root.bin"), b"rootcontent").unwrap();
        std::fs::write(dir.path().join("y/mid.bin"), b"midcontent").unwrap();
        std::fs::write(dir.path().join("y/z/leaf.bin"), b"leafcontent").unwrap();

        let remote_root = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path().join("registry.json"));
        let copier = LocalCopier::new(remote_root.path());
        let mut opts = options();
        opts.recursive = true;

        archive_folder(dir.path(), &config(), &opts, &registry, &copier).unwrap();

        assert!(registry.has_exact_entry(dir.path()));
        assert!(!registry.has_exact_entry(&dir.path().join("y")));
        assert!(registry.get(&dir.path().join("y")).is_some());
        assert!(registry.get(&dir.path().join("y/z")).is_some());
        assert!(dir.path().join("y/z").join(MANIFEST_FILENAME).exists());
    }
}
