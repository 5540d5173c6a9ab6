//! Small-file tar packing and the all-files CSV catalog (§4.4).

use std::fs::{self, File};
use std::io::{Read, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::errors::{Error, Result};
use crate::meta::{is_meta_file, ALLFILES_CSV_FILENAME, SMALLFILES_TAR_FILENAME};
use crate::owner::{self, Owner};

/// One row of `Froster.allfiles.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllFilesRow {
    pub file: String,
    pub size_bytes: u64,
    pub date_modified: OffsetDateTime,
    pub date_accessed: OffsetDateTime,
    pub owner: Owner,
    pub mode: u32,
    pub tarred: bool,
}

impl AllFilesRow {
    fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{:o},{}",
            csv_escape(&self.file),
            self.size_bytes,
            format_local(self.date_modified),
            format_local(self.date_accessed),
            csv_escape(&self.owner.user),
            csv_escape(&self.owner.group),
            self.mode & 0o7777,
            if self.tarred { "Yes" } else { "No" },
        )
    }
}

fn format_local(t: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        t.year(),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    )
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub const ALLFILES_CSV_HEADER: &str =
    "File,Size(bytes),Date-Modified,Date-Accessed,Owner,Group,Permissions,Tarred";

pub struct PackResult {
    pub rows: Vec<AllFilesRow>,
    pub tarred_count: usize,
}

/// Enumerate the direct regular-file children of `dir` (excluding meta
/// files), record a catalog row for each, and — when `pack_small` is set —
/// append every file smaller than `threshold_kib * 1024` bytes (strictly
/// less than, per §8) to `Froster.smallfiles.tar`, then remove it from
/// disk.
///
/// Always writes `Froster.allfiles.csv`, even when nothing qualified for
/// packing. Removes the tar if nothing was packed, so its absence is a
/// reliable signal that this folder has no packed content.
pub fn pack(dir: &Path, threshold_kib: u64, pack_small: bool) -> Result<PackResult> {
    let threshold_bytes = threshold_kib.saturating_mul(1024);
    let mut rows = Vec::new();
    let mut to_tar: Vec<PathBuf> = Vec::new();

    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_meta_file(&name) {
            continue;
        }
        let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;
        if !file_type.is_file() {
            continue;
        }
        let metadata = entry.metadata().map_err(|e| Error::io(&path, e))?;
        let size = metadata.len();
        let tarred = pack_small && size < threshold_bytes;
        if tarred {
            to_tar.push(path.clone());
        }
        rows.push(AllFilesRow {
            file: name,
            size_bytes: size,
            date_modified: OffsetDateTime::from(metadata.modified().map_err(|e| Error::io(&path, e))?),
            date_accessed: OffsetDateTime::from(metadata.accessed().map_err(|e| Error::io(&path, e))?),
            owner: owner::lookup(metadata.uid(), metadata.gid()),
            mode: metadata.mode(),
            tarred,
        });
    }

    let tarred_count = to_tar.len();
    let tar_path = dir.join(SMALLFILES_TAR_FILENAME);
    if tarred_count > 0 {
        write_tar(&tar_path, &to_tar)?;
        for path in &to_tar {
            fs::remove_file(path).map_err(|e| Error::io(path, e))?;
        }
    } else if tar_path.exists() {
        fs::remove_file(&tar_path).map_err(|e| Error::io(&tar_path, e))?;
    }

    write_allfiles_csv(&dir.join(ALLFILES_CSV_FILENAME), &rows)?;
    Ok(PackResult { rows, tarred_count })
}

fn write_tar(tar_path: &Path, files: &[PathBuf]) -> Result<()> {
    let result: std::io::Result<()> = (|| {
        let f = File::create(tar_path)?;
        let mut builder = tar::Builder::new(f);
        for path in files {
            let basename = path.file_name().expect("file has a name");
            builder.append_path_with_name(path, basename)?;
        }
        builder.finish()
    })();
    let folder = tar_path.parent().unwrap_or(tar_path);
    result.map_err(|e| pack_or_unpack_error(folder, e, false))
}

/// Distinguish a denied write/read from any other pack/unpack failure, so
/// `Error::PermissionDenied` (§4.4) is reachable instead of every io error
/// collapsing into `PackFailed`/`UnpackFailed`.
fn pack_or_unpack_error(folder: &Path, e: std::io::Error, unpacking: bool) -> Error {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        return Error::PermissionDenied {
            path: folder.to_path_buf(),
            reason: e.to_string(),
        };
    }
    if unpacking {
        Error::UnpackFailed {
            folder: folder.to_path_buf(),
            reason: e.to_string(),
        }
    } else {
        Error::PackFailed {
            folder: folder.to_path_buf(),
            reason: e.to_string(),
        }
    }
}

fn write_allfiles_csv(path: &Path, rows: &[AllFilesRow]) -> Result<()> {
    let mut f = File::create(path).map_err(|e| Error::io(path, e))?;
    writeln!(f, "{ALLFILES_CSV_HEADER}").map_err(|e| Error::io(path, e))?;
    for row in rows {
        writeln!(f, "{}", row.to_csv_line()).map_err(|e| Error::io(path, e))?;
    }
    Ok(())
}

/// Extract `Froster.smallfiles.tar` (if present) into `dir`, preserving
/// names, then remove the tar.
pub fn unpack(dir: &Path) -> Result<()> {
    let tar_path = dir.join(SMALLFILES_TAR_FILENAME);
    if !tar_path.exists() {
        return Ok(());
    }
    let result: std::io::Result<()> = (|| {
        let f = File::open(&tar_path)?;
        let mut archive = tar::Archive::new(f);
        for entry in archive.entries()? {
            let mut entry = entry?;
            let relpath = entry.path()?.into_owned();
            let dest = dir.join(&relpath);
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            fs::write(&dest, &buf)?;
        }
        Ok(())
    })();
    result.map_err(|e| pack_or_unpack_error(dir, e, true))?;
    fs::remove_file(&tar_path).map_err(|e| Error::io(&tar_path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_tars_files_below_threshold_strictly() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("small.txt"), vec![0u8; 100]).unwrap();
        std::fs::write(dir.path().join("exact.txt"), vec![0u8; 1024]).unwrap();
        std::fs::write(dir.path().join("big.bin"), vec![0u8; 2048]).unwrap();

        let result = pack(dir.path(), 1, true).unwrap();
        assert_eq!(result.tarred_count, 1);
        assert!(!dir.path().join("small.txt").exists());
        assert!(dir.path().join("exact.txt").exists(), "exact threshold must not be packed");
        assert!(dir.path().join("big.bin").exists());
        assert!(dir.path().join(SMALLFILES_TAR_FILENAME).exists());
    }

    #[test]
    fn pack_removes_tar_when_nothing_qualifies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.bin"), vec![0u8; 4096]).unwrap();
        let result = pack(dir.path(), 1, true).unwrap();
        assert_eq!(result.tarred_count, 0);
        assert!(!dir.path().join(SMALLFILES_TAR_FILENAME).exists());
    }

    #[test]
    fn pack_then_unpack_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("small.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join("small2.txt"), b"world").unwrap();
        pack(dir.path(), 1024, true).unwrap();
        assert!(!dir.path().join("small.txt").exists());

        unpack(dir.path()).unwrap();
        assert_eq!(std::fs::read(dir.path().join("small.txt")).unwrap(), b"hello");
        assert_eq!(std::fs::read(dir.path().join("small2.txt")).unwrap(), b"world");
        assert!(!dir.path().join(SMALLFILES_TAR_FILENAME).exists());
    }

    #[test]
    fn allfiles_csv_always_written() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"x").unwrap();
        pack(dir.path(), 1, false).unwrap();
        let csv = std::fs::read_to_string(dir.path().join(ALLFILES_CSV_FILENAME)).unwrap();
        assert!(csv.starts_with(ALLFILES_CSV_HEADER));
        assert!(csv.contains("a.bin"));
        assert!(csv.contains(",No"));
    }
}
