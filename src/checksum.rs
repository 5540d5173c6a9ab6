//! Parallel per-file content hashing and the manifest file format (§4.3).
//!
//! The hash is MD5, read in 4 KiB chunks — not a free choice: it is the
//! on-disk format contract inherited from the original implementation
//! (`hashlib.md5(); f.read(4096)`), and changing it would break the
//! ability to verify existing archives.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::MIN_CORES;
use crate::errors::{Error, Result};
use crate::meta::is_manifest_excluded;

const HASH_BLOCK_SIZE: usize = 4096;

/// Hex-lowercase MD5 digest of a single file, read in fixed-size blocks.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; HASH_BLOCK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// One entry in a manifest: a file's basename and its hex digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub basename: String,
    pub digest: String,
}

pub fn build_pool(requested_cores: usize) -> Result<ThreadPool> {
    let n = requested_cores.max(MIN_CORES);
    ThreadPoolBuilder::new()
        .num_threads(n)
        .build()
        .map_err(|e| Error::ManifestFailed {
            folder: PathBuf::new(),
            reason: format!("failed to build hashing pool: {e}"),
        })
}

/// Enumerate the direct regular-file children of `dir` (excluding meta
/// files), hash each in parallel, and write `manifest_name` in the format
/// `<hex digest><two spaces><basename>\n`.
///
/// Fails if no files qualified; removes a zero-byte manifest rather than
/// leaving it behind as a false signal of success.
pub fn compute_manifest(
    dir: &Path,
    manifest_name: &str,
    pool: &ThreadPool,
) -> Result<Vec<ManifestEntry>> {
    let candidates = direct_regular_files(dir, manifest_name)?;
    if candidates.is_empty() {
        return Err(Error::ManifestFailed {
            folder: dir.to_path_buf(),
            reason: "no files to hash".to_string(),
        });
    }

    let results: Vec<io::Result<ManifestEntry>> = pool.install(|| {
        use rayon::prelude::*;
        candidates
            .par_iter()
            .map(|path| {
                let basename = path
                    .file_name()
                    .expect("direct child has a file name")
                    .to_string_lossy()
                    .into_owned();
                hash_file(path).map(|digest| ManifestEntry { basename, digest })
            })
            .collect()
    });

    let mut entries = Vec::with_capacity(results.len());
    for r in results {
        entries.push(r.map_err(|e| Error::ManifestFailed {
            folder: dir.to_path_buf(),
            reason: e.to_string(),
        })?);
    }
    entries.sort_by(|a, b| a.basename.cmp(&b.basename));

    let manifest_path = dir.join(manifest_name);
    write_manifest(&manifest_path, &entries)?;
    Ok(entries)
}

fn direct_regular_files(dir: &Path, manifest_name: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let read_dir = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in read_dir {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == manifest_name || is_manifest_excluded(&name) {
            continue;
        }
        let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;
        if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(out)
}

fn write_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<()> {
    let result: io::Result<()> = (|| {
        let mut f = File::create(path)?;
        for e in entries {
            writeln!(f, "{}  {}", e.digest, e.basename)?;
        }
        Ok(())
    })();
    if let Err(e) = result {
        let _ = std::fs::remove_file(path);
        return Err(Error::ManifestFailed {
            folder: path.parent().unwrap_or(path).to_path_buf(),
            reason: e.to_string(),
        });
    }
    Ok(())
}

/// Parse a manifest file back into entries.
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mut entries = Vec::new();
    for line in text.lines() {
        if let Some((digest, basename)) = line.split_once("  ") {
            entries.push(ManifestEntry {
                digest: digest.to_string(),
                basename: basename.to_string(),
            });
        }
    }
    Ok(entries)
}
