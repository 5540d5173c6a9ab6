//! The production `ExternalWalker`: shells out to the `pwalk` parallel
//! filesystem crawler and parses its per-directory CSV output.
//!
//! `pwalk` is not a Rust crate — it's the external C tool the original
//! implementation drives via `subprocess.run(...)`, producing one row per
//! directory with `UID,GID,st_atime,st_mtime,pw_dirsum,pw_fcount,filename`
//! among its columns. This mirrors that invocation instead of trying to
//! reimplement pwalk's recursive directory aggregation in Rust.

use std::path::Path;
use std::process::Command;

use time::OffsetDateTime;

use crate::errors::{Error, Result};
use crate::indexer::{ExternalWalkRow, ExternalWalker};

pub struct PwalkWalker {
    binary: String,
}

impl PwalkWalker {
    pub fn new(binary: impl Into<String>) -> Self {
        PwalkWalker { binary: binary.into() }
    }
}

impl Default for PwalkWalker {
    fn default() -> Self {
        PwalkWalker::new("pwalk")
    }
}

impl ExternalWalker for PwalkWalker {
    fn walk(&self, root: &Path) -> Result<Vec<ExternalWalkRow>> {
        let output = Command::new(&self.binary)
            .args(["--NoSnap", "--one-file-system", "--header"])
            .arg(root)
            .output()
            .map_err(|e| Error::CopierFailed {
                reason: format!("failed to run {}: {e}", self.binary),
            })?;
        if !output.status.success() {
            return Err(Error::CopierFailed {
                reason: format!(
                    "{} exited with {}: {}",
                    self.binary,
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }
        parse_pwalk_csv(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses pwalk's CSV, keyed by header rather than fixed column position —
/// pwalk's column set has grown across versions. Rows with `pw_fcount <= -1`
/// are per-file rows, not directory summaries, and are skipped (mirrors the
/// original's `WHERE pw_fcount > -1` filter).
fn parse_pwalk_csv(text: &str) -> Result<Vec<ExternalWalkRow>> {
    let mut lines = text.lines();
    let header = lines.next().unwrap_or_default();
    let columns: Vec<&str> = header.split(',').collect();
    let index_of = |name: &str| columns.iter().position(|c| c.eq_ignore_ascii_case(name));

    let (Some(uid_i), Some(gid_i), Some(atime_i), Some(mtime_i), Some(dirsum_i), Some(fcount_i), Some(path_i)) = (
        index_of("UID"),
        index_of("GID"),
        index_of("st_atime"),
        index_of("st_mtime"),
        index_of("pw_dirsum"),
        index_of("pw_fcount"),
        index_of("filename"),
    ) else {
        return Err(Error::CopierFailed {
            reason: "pwalk output is missing an expected column".to_string(),
        });
    };

    let mut rows = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        let max_index = [uid_i, gid_i, atime_i, mtime_i, dirsum_i, fcount_i, path_i]
            .into_iter()
            .max()
            .unwrap_or(0);
        if fields.len() <= max_index {
            continue;
        }
        let file_count: i64 = fields[fcount_i].trim().parse().unwrap_or(-1);
        if file_count <= -1 {
            continue;
        }
        let bytes: i64 = fields[dirsum_i].trim().parse().unwrap_or(0);
        if bytes <= 0 {
            continue;
        }
        rows.push(ExternalWalkRow {
            path: Path::new(fields[path_i].trim()).to_path_buf(),
            uid: fields[uid_i].trim().parse().unwrap_or(0),
            gid: fields[gid_i].trim().parse().unwrap_or(0),
            atime: epoch_seconds(fields[atime_i].trim()),
            mtime: epoch_seconds(fields[mtime_i].trim()),
            bytes: bytes as u64,
            file_count: file_count as u64,
        });
    }
    Ok(rows)
}

fn epoch_seconds(raw: &str) -> OffsetDateTime {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_directory_rows_and_skips_file_rows() {
        let csv = "UID,GID,st_atime,st_mtime,pw_dirsum,pw_fcount,filename\n\
                    1000,1000,1700000000,1700000000,2147483648,4,/data/proj\n\
                    1000,1000,1700000000,1700000000,0,-1,/data/proj/a.bin\n";
        let rows = parse_pwalk_csv(csv).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, Path::new("/data/proj"));
        assert_eq!(rows[0].bytes, 2147483648);
        assert_eq!(rows[0].file_count, 4);
    }

    #[test]
    fn missing_column_is_an_error() {
        let csv = "UID,GID,filename\n1000,1000,/data\n";
        let result = parse_pwalk_csv(csv);
        assert!(result.is_err());
    }
}
