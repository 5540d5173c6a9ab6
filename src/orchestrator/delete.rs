//! Delete orchestrator (§4.11): reverse-verify against the archive, remove
//! the local content, and leave a breadcrumb behind.

use std::path::Path;

use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::config::FrosterConfig;
use crate::copier::{Copier, CopyOptions};
use crate::errors::{Error, Result};
use crate::meta::{self, MANIFEST_FILENAME, RESTORED_MANIFEST_FILENAME, WHERE_DID_IT_GO_FILENAME};
use crate::pathutil;
use crate::registry::Registry;

const ARCHIVE_TOOL_URL: &str = "https://github.com/dirkpetersen/froster/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted_files: Vec<String>,
}

/// Verify `folder`'s content against its archive, then delete every direct
/// child file except the reserved meta names, writing
/// `Where-did-the-files-go.txt` in their place (§4.11).
#[instrument(skip(registry, copier, config), fields(folder = %folder.display()))]
pub fn delete_folder(
    folder: &Path,
    config: &FrosterConfig,
    registry: &Registry,
    copier: &dyn Copier,
    now: OffsetDateTime,
) -> Result<DeleteOutcome> {
    let folder_buf = pathutil::canonicalize(folder)?;
    let folder = folder_buf.as_path();

    let entry = registry.get(folder).ok_or_else(|| Error::NotArchived {
        folder: folder.to_path_buf(),
    })?;

    let manifest_path = folder.join(MANIFEST_FILENAME);
    let manifest_path = if manifest_path.exists() {
        manifest_path
    } else {
        let restored = folder.join(RESTORED_MANIFEST_FILENAME);
        if !restored.exists() {
            return Err(Error::DeleteVerificationFailed {
                folder: folder.to_path_buf(),
                reason: "no manifest found; nothing to verify against".to_string(),
            });
        }
        restored
    };

    let local_root = Path::new(&entry.local_folder);
    let relative_tail = folder
        .strip_prefix(local_root)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let remote_folder = entry.archive_folder.join(&relative_tail);

    let verify = copier.verify_checksum(&manifest_path, remote_folder.as_str(), &CopyOptions::default())?;
    if verify.mismatches > 0 {
        return Err(Error::DeleteVerificationFailed {
            folder: folder.to_path_buf(),
            reason: format!("{} file(s) did not match the archive", verify.mismatches),
        });
    }

    let mut deleted_files = Vec::new();
    for dir_entry in std::fs::read_dir(folder).map_err(|e| Error::io(folder, e))? {
        let dir_entry = dir_entry.map_err(|e| Error::io(folder, e))?;
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        if meta::is_meta_file(&name) {
            continue;
        }
        let file_type = dir_entry.file_type().map_err(|e| Error::io(folder, e))?;
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }
        std::fs::remove_file(dir_entry.path()).map_err(|e| Error::io(&dir_entry.path(), e))?;
        deleted_files.push(name);
    }

    write_where_did_it_go(folder, config, &entry, &remote_folder.to_string(), &deleted_files, now)?;

    info!(archive_folder = %remote_folder, deleted = deleted_files.len(), "deleted");
    Ok(DeleteOutcome { deleted_files })
}

fn write_where_did_it_go(
    folder: &Path,
    config: &FrosterConfig,
    entry: &crate::model::ArchiveEntry,
    remote_folder: &str,
    deleted_files: &[String],
    now: OffsetDateTime,
) -> Result<()> {
    use std::fmt::Write as _;

    let mut body = String::new();
    let _ = writeln!(body, "The files in this folder have been moved to an AWS S3 archive!");
    let _ = writeln!(body);
    let _ = writeln!(body, "Archive location: {remote_folder}");
    let _ = writeln!(body, "Archive profile (~/.aws): {}", entry.profile);
    let _ = writeln!(body, "Archiver user: {}", entry.user);
    let _ = writeln!(body, "Archiver email: {}", config.contact_email);
    let _ = writeln!(body, "Archive tool: {ARCHIVE_TOOL_URL}");
    let _ = writeln!(body, "Restore command: froster restore \"{}\"", folder.display());
    let _ = writeln!(body, "Deletion date: {now}");
    let _ = writeln!(body);
    let _ = writeln!(body, "First {} files deleted this time:", deleted_files.len().min(10));
    let _ = writeln!(body, "{}", deleted_files.iter().take(10).cloned().collect::<Vec<_>>().join(", "));
    let _ = writeln!(body);
    let _ = writeln!(body, "Please see more metadata in Froster.allfiles.csv");

    let path = folder.join(WHERE_DID_IT_GO_FILENAME);
    std::fs::write(&path, body).map_err(|e| Error::io(&path, e))
}
