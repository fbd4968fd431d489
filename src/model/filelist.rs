// src/model/filelist.rs

//! Point-in-time file lists of a location and the differences between
//! consecutive ones.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::store::FilelistStore;

/// Every path below `root`, sorted and deduplicated. Directories are listed
/// as well as files. Symlinks are listed but never followed, so a link cycle
/// cannot make the walk loop. The root itself may be a link.
pub fn snapshot(fs: &dyn FileSystem, root: &Path) -> Result<Vec<String>> {
    if !fs.is_dir(root) {
        return Err(anyhow!("cannot list files of {:?}: not a directory", root).into());
    }

    let mut seen = BTreeSet::new();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs.read_dir(&dir)? {
            if !fs.is_symlink(&entry) && fs.is_dir(&entry) {
                pending.push(entry.clone());
            }
            seen.insert(entry.to_string_lossy().into_owned());
        }
    }
    Ok(seen.into_iter().collect())
}

pub fn save_snapshot(
    store: &dyn FilelistStore,
    location: &str,
    at: DateTime<Utc>,
    files: &[String],
) -> Result<()> {
    store.add_filelist(location, at, files)
}

/// Paths added and removed going from `old` to `new`, each sorted.
pub fn diff_lists(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old: BTreeSet<&String> = old.iter().collect();
    let new: BTreeSet<&String> = new.iter().collect();
    let created = new.difference(&old).map(|s| s.to_string()).collect();
    let deleted = old.difference(&new).map(|s| s.to_string()).collect();
    (created, deleted)
}

/// A pair of consecutive snapshots of one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    pub location: String,
    pub previous: DateTime<Utc>,
    pub at: DateTime<Utc>,
}

impl Diff {
    /// Load both snapshots and return `(created, deleted)`.
    pub fn take(&self, store: &dyn FilelistStore) -> Result<(Vec<String>, Vec<String>)> {
        let old = store.read_filelist(&self.location, self.previous)?;
        let new = store.read_filelist(&self.location, self.at)?;
        Ok(diff_lists(&old, &new))
    }
}

/// Diffs grouped by location, newest first. The oldest snapshot of a
/// location has nothing to compare against and yields no diff.
pub fn diffs_per_location(store: &dyn FilelistStore) -> Result<BTreeMap<String, Vec<Diff>>> {
    let mut grouped: BTreeMap<String, Vec<DateTime<Utc>>> = BTreeMap::new();
    for (location, at) in store.list_filelists()? {
        grouped.entry(location).or_default().push(at);
    }

    Ok(grouped
        .into_iter()
        .map(|(location, mut stamps)| {
            stamps.sort_unstable_by(|a, b| b.cmp(a));
            stamps.dedup();
            let diffs = stamps
                .windows(2)
                .map(|pair| Diff {
                    location: location.clone(),
                    previous: pair[1],
                    at: pair[0],
                })
                .collect();
            (location, diffs)
        })
        .collect())
}
