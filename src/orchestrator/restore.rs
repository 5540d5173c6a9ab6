//! Restore orchestrator (§4.10): resolve entry → glacier restore (optional)
//! → download → reverse verify → unpack → ready.

use std::path::Path;

use tracing::{info, instrument};

use crate::checksum;
use crate::config::FrosterConfig;
use crate::copier::{Copier, CopyOptions, Depth};
use crate::errors::{Error, Result};
use crate::glacier::{self, GlacierBackend};
use crate::meta::RESTORED_MANIFEST_FILENAME;
use crate::model::RetrievalTier;
use crate::packer;
use crate::pathutil;
use crate::registry::Registry;
use crate::scheduler::JobScheduler;

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub recursive: bool,
    pub retrieval_tier: RetrievalTier,
    pub retention_days: u32,
    /// Only request the glacier restore and report pending counts; never
    /// download (§4.10 step 5 "if download is not suppressed").
    pub suppress_download: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        RestoreOptions {
            recursive: false,
            retrieval_tier: RetrievalTier::Standard,
            retention_days: 30,
            suppress_download: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    GlacierPending { count: usize },
}

#[instrument(skip(registry, copier, glacier_backend, scheduler), fields(folder = %folder.display()))]
pub fn restore_folder(
    folder: &Path,
    config: &FrosterConfig,
    options: &RestoreOptions,
    registry: &Registry,
    copier: &dyn Copier,
    glacier_backend: Option<&dyn GlacierBackend>,
    scheduler: Option<&dyn JobScheduler>,
) -> Result<RestoreOutcome> {
    let folder_buf = pathutil::canonicalize(folder)?;
    let folder = folder_buf.as_path();

    let entry = registry.get(folder).ok_or_else(|| Error::NotArchived {
        folder: folder.to_path_buf(),
    })?;

    let local_root = Path::new(&entry.local_folder);
    let relative_tail = if folder == local_root {
        String::new()
    } else {
        let tail = folder
            .strip_prefix(local_root)
            .map_err(|_| Error::NotArchived {
                folder: folder.to_path_buf(),
            })?;
        if !matches!(entry.archive_mode, crate::model::ArchiveMode::Recursive) {
            return Err(Error::ParentNotRecursive {
                folder: folder.to_path_buf(),
                parent: local_root.to_path_buf(),
            });
        }
        tail.to_string_lossy().into_owned()
    };

    let remote_src = entry.archive_folder.join(&relative_tail);

    if entry.storage_class.is_glacier_tier() {
        if let Some(backend) = glacier_backend {
            let prefix = remote_src.as_str().trim_start_matches(":s3:");
            let result = glacier::restore_and_classify(
                backend,
                prefix,
                options.retrieval_tier,
                options.retention_days,
                options.recursive,
            )?;
            if result.is_pending() {
                if let Some(scheduler) = scheduler {
                    let _ = scheduler.submit(&format!("froster restore {}", folder.display()));
                }
                return Ok(RestoreOutcome::GlacierPending {
                    count: result.pending_count(),
                });
            }
        }
    }

    if options.suppress_download {
        return Ok(RestoreOutcome::GlacierPending { count: 0 });
    }

    let depth = if options.recursive { Depth::Recursive } else { Depth::One };
    let copy_options = CopyOptions {
        depth,
        follow_symlinks: true,
        excludes: vec![],
        storage_class_override: None,
    };
    let report = copier.copy_down(remote_src.as_str(), folder, &copy_options)?;
    if !report.success() {
        return Err(Error::VerificationFailed {
            folder: folder.to_path_buf(),
            archive_folder: remote_src.to_string(),
            mismatches: report.errors,
        });
    }

    let pool = checksum::build_pool(config.effective_cores())?;
    checksum::compute_manifest(folder, RESTORED_MANIFEST_FILENAME, &pool)?;
    let verify = copier.verify_checksum(
        &folder.join(RESTORED_MANIFEST_FILENAME),
        remote_src.as_str(),
        &copy_options,
    )?;
    if verify.mismatches > 0 {
        return Err(Error::VerificationFailed {
            folder: folder.to_path_buf(),
            archive_folder: remote_src.to_string(),
            mismatches: verify.mismatches,
        });
    }

    packer::unpack(folder)?;

    info!(archive_folder = %remote_src, "restored");
    Ok(RestoreOutcome::Restored)
}
