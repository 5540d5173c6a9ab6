//! Per-directory aggregation, hotspot selection, and the hotspots CSV
//! (§4.5).

use std::fs;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::config::FrosterConfig;
use crate::errors::{Error, Result};
use crate::meta::is_meta_file;
use crate::owner;

/// One row produced by the external tree-walker contract (§6): at minimum
/// `(uid, gid, atime, mtime, sum_of_descendant_bytes, file_count, path)`.
#[derive(Debug, Clone)]
pub struct ExternalWalkRow {
    pub path: PathBuf,
    pub uid: u32,
    pub gid: u32,
    pub atime: OffsetDateTime,
    pub mtime: OffsetDateTime,
    pub bytes: u64,
    pub file_count: u64,
}

/// Narrow interface over the external tree-walker tool.
pub trait ExternalWalker {
    fn walk(&self, root: &Path) -> Result<Vec<ExternalWalkRow>>;
}

/// One row of a hotspots CSV (§3, §6).
#[derive(Debug, Clone)]
pub struct HotspotRow {
    pub user: String,
    pub group: String,
    pub access_days: i64,
    pub mod_days: i64,
    pub gib: f64,
    pub avg_mib: f64,
    pub folder: PathBuf,
    pub tib: f64,
    pub file_count: u64,
    pub dir_size: u64,
}

pub const HOTSPOTS_CSV_HEADER: &str =
    "User,AccD,ModD,GiB,MiBAvg,Folder,Group,TiB,FileCount,DirSize";

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const TIB: f64 = 1024.0 * 1024.0 * 1024.0 * 1024.0;

/// Keep rows with files and bytes, sort by bytes descending, and keep only
/// those meeting both size thresholds (§4.5).
pub fn select_hotspots(
    rows: Vec<ExternalWalkRow>,
    min_folder_gib: f64,
    min_avg_mib: f64,
    now: OffsetDateTime,
) -> Vec<HotspotRow> {
    let mut rows: Vec<ExternalWalkRow> = rows
        .into_iter()
        .filter(|r| r.file_count > 0 && r.bytes > 0)
        .collect();
    rows.sort_by(|a, b| b.bytes.cmp(&a.bytes));

    rows.into_iter()
        .filter_map(|r| {
            let gib = r.bytes as f64 / GIB;
            let avg_mib = (r.bytes as f64 / r.file_count as f64) / MIB;
            if gib < min_folder_gib || avg_mib < min_avg_mib {
                return None;
            }
            // Folder timestamps are unreliable post-crawl; recompute from
            // the newest non-meta direct child file, if any can be read.
            let (atime, mtime) = newest_child_times(&r.path).unwrap_or((r.atime, r.mtime));
            let owner = owner::lookup(r.uid, r.gid);
            Some(HotspotRow {
                user: owner.user,
                group: owner.group,
                access_days: days_ago(atime, now),
                mod_days: days_ago(mtime, now),
                gib,
                avg_mib,
                folder: r.path,
                tib: r.bytes as f64 / TIB,
                file_count: r.file_count,
                dir_size: r.bytes,
            })
        })
        .collect()
}

fn days_ago(t: OffsetDateTime, now: OffsetDateTime) -> i64 {
    (now - t).whole_days().max(0)
}

fn newest_child_times(dir: &Path) -> Option<(OffsetDateTime, OffsetDateTime)> {
    let read_dir = fs::read_dir(dir).ok()?;
    let mut newest: Option<(OffsetDateTime, OffsetDateTime)> = None;
    for entry in read_dir.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_meta_file(&name) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(mtime) = metadata.modified() else {
            continue;
        };
        let mtime = OffsetDateTime::from(mtime);
        let atime = metadata
            .accessed()
            .map(OffsetDateTime::from)
            .unwrap_or(mtime);
        newest = match newest {
            Some((_, best_m)) if best_m >= mtime => newest,
            _ => Some((atime, mtime)),
        };
    }
    newest
}

/// Total bytes whose access-age exceeds each configured bucket threshold,
/// in TiB.
pub fn age_bucket_tib(rows: &[ExternalWalkRow], buckets_days: &[u64], now: OffsetDateTime) -> Vec<(u64, f64)> {
    buckets_days
        .iter()
        .map(|&threshold| {
            let total: u64 = rows
                .iter()
                .filter(|r| days_ago(r.atime, now) as u64 > threshold)
                .map(|r| r.bytes)
                .sum();
            (threshold, total as f64 / TIB)
        })
        .collect()
}

const AGE_BUCKETS_CSV_HEADER: &str = "ThresholdDays,TiB";

fn age_bucket_csv(buckets: &[(u64, f64)]) -> String {
    let mut text = String::from(AGE_BUCKETS_CSV_HEADER);
    text.push('\n');
    for (threshold, tib) in buckets {
        text.push_str(&format!("{threshold},{tib:.4}\n"));
    }
    text
}

fn hotspot_csv_line(row: &HotspotRow) -> String {
    format!(
        "{},{},{},{:.2},{:.2},{},{},{:.4},{},{}",
        row.user,
        row.access_days,
        row.mod_days,
        row.gib,
        row.avg_mib,
        row.folder.display(),
        row.group,
        row.tib,
        row.file_count,
        row.dir_size,
    )
}

/// Filesystem-name-safe, ≤255-byte encoding of a scanned root, used as the
/// hotspots CSV's filename. Long paths are center-elided with a fixed
/// marker so distinct long inputs stay distinguishable at both ends.
pub fn encode_path_for_filename(path: &Path) -> String {
    const MAX_BYTES: usize = 255 - 4; // room for ".csv"
    const MARKER: &str = "...";
    let raw = path.to_string_lossy().replace('/', "_");
    if raw.len() <= MAX_BYTES {
        return raw;
    }
    let keep = (MAX_BYTES - MARKER.len()) / 2;
    let head: String = raw.chars().take(keep).collect();
    let tail: String = raw
        .chars()
        .rev()
        .take(MAX_BYTES - MARKER.len() - keep)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{head}{MARKER}{tail}")
}

/// An external destination the hotspots CSV (and age-bucket report) are
/// copied to once written, e.g. a shared mount other tooling polls. Modeled
/// on `pwalkcopy`, which re-crawls and copies out unconditionally instead of
/// honoring the idempotence short-circuit below.
pub trait HotspotsSink {
    fn copy_out(&self, path: &Path) -> Result<()>;
}

/// Copies the written CSV into another local directory, keeping its name.
pub struct CopyToDirSink {
    pub dest_dir: PathBuf,
}

impl HotspotsSink for CopyToDirSink {
    fn copy_out(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(&self.dest_dir).map_err(|e| Error::io(&self.dest_dir, e))?;
        let dest = self.dest_dir.join(path.file_name().expect("hotspots path has a file name"));
        fs::copy(path, &dest).map_err(|e| Error::io(&dest, e))?;
        Ok(())
    }
}

/// Run the indexer end to end: invoke `walker` over `root`, select
/// hotspots, and write the CSV and age-bucket report under
/// `config.hotspots_dir`. A no-op if the target file already exists
/// (idempotence, §4.5), unless `force` is set or a copy-out `sink` is
/// configured — a sink always re-crawls so it has fresh output to copy out.
pub fn run(
    walker: &dyn ExternalWalker,
    root: &Path,
    config: &FrosterConfig,
    min_folder_gib: f64,
    min_avg_mib: f64,
    force: bool,
    now: OffsetDateTime,
    sink: Option<&dyn HotspotsSink>,
) -> Result<Option<PathBuf>> {
    let filename = format!("{}.csv", encode_path_for_filename(root));
    let out_path = config.hotspots_dir.join(filename);
    if out_path.exists() && !force && sink.is_none() {
        return Ok(None);
    }

    let rows = walker.walk(root)?;
    let buckets = age_bucket_tib(&rows, &config.age_buckets_days, now);
    let hotspots = select_hotspots(rows, min_folder_gib, min_avg_mib, now);

    let mut text = String::from(HOTSPOTS_CSV_HEADER);
    text.push('\n');
    for row in &hotspots {
        text.push_str(&hotspot_csv_line(row));
        text.push('\n');
    }
    fs::write(&out_path, text).map_err(|e| Error::io(&out_path, e))?;

    let age_buckets_path = config.hotspots_dir.join(format!("{}.agebuckets.csv", encode_path_for_filename(root)));
    fs::write(&age_buckets_path, age_bucket_csv(&buckets)).map_err(|e| Error::io(&age_buckets_path, e))?;

    if let Some(sink) = sink {
        sink.copy_out(&out_path)?;
        sink.copy_out(&age_buckets_path)?;
    }

    Ok(Some(out_path))
}
