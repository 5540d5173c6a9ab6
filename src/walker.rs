//! Directory tree traversal with a skip-set and an error sink (§4.2).
//!
//! Built on `walkdir`, the way several trees in this codebase's lineage
//! crawl directories; `conserve`'s own `live_tree::LiveTree` iterator shows
//! the same shape (top-down order, a `problem()` callback instead of
//! aborting on a single bad `stat`), reproduced here on top of `walkdir`
//! rather than a hand-rolled `VecDeque`.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// One directory visited by the walk, with its direct (already filtered)
/// sub-directories and files.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub dir: PathBuf,
    pub subdirs: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

/// Crawl `root` top-down, pruning any directory whose name is in
/// `skip_names`, never crossing mount points, and reporting per-entry stat
/// errors to `on_error` instead of aborting the walk.
pub fn walk(
    root: &Path,
    skip_names: &HashSet<OsString>,
    mut on_error: impl FnMut(&Path, &walkdir::Error),
) -> Vec<WalkEntry> {
    let mut by_dir: Vec<WalkEntry> = Vec::new();
    let walker = WalkDir::new(root)
        .same_file_system(true)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !skip_names.contains(e.file_name())
        });

    // Track children per parent directory as entries arrive; walkdir yields
    // top-down, so a directory's entry always precedes its children.
    let mut index_of: std::collections::HashMap<PathBuf, usize> = std::collections::HashMap::new();

    for item in walker {
        let entry = match item {
            Ok(e) => e,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                on_error(&path, &e);
                continue;
            }
        };
        let path = entry.path().to_path_buf();
        if entry.file_type().is_dir() {
            index_of.insert(path.clone(), by_dir.len());
            by_dir.push(WalkEntry {
                dir: path,
                subdirs: Vec::new(),
                files: Vec::new(),
            });
        } else if let Some(parent) = path.parent() {
            if let Some(&idx) = index_of.get(parent) {
                by_dir[idx].files.push(path);
            }
        }
    }

    // Second pass: fill in subdirs now that every directory has an index.
    let dirs: Vec<PathBuf> = by_dir.iter().map(|e| e.dir.clone()).collect();
    for dir in &dirs {
        if let Some(parent) = dir.parent() {
            if let Some(&idx) = index_of.get(parent) {
                by_dir[idx].subdirs.push(dir.clone());
            }
        }
    }

    by_dir
}

pub fn default_skip_names() -> HashSet<OsString> {
    [".snapshot"].iter().map(OsString::from).collect()
}
