//! Cold start: rebuilds the level structure from the data directory.
//!
//! Levels live in `<data_dir>/level-0`, `level-1`, ... and are loaded in
//! order until the first missing directory. Level-0 runs that a deeper
//! level already covers are dropped. The write buffer is not persisted, so
//! only flushed data survives a restart.
use config::EngineConfig;
use sstable::{parse_run_file_name, SSTableReader};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::level::Level;
use crate::{Error, Result};

/// Loads every level under `config.data_dir` and returns them with the
/// next timestamp to assign (one past the largest on disk, or 1).
///
/// # Errors
///
/// [`Error::Io`] if a directory cannot be read, [`Error::Run`] if a run
/// fails to open, [`Error::Invariant`] if runs of a level >= 1 overlap.
pub(crate) fn load_levels(config: &EngineConfig) -> Result<(Vec<Level>, u64)> {
    fs::create_dir_all(&config.data_dir).map_err(|e| Error::io(&config.data_dir, e))?;

    let mut levels = Vec::new();
    let mut max_ts = 0u64;

    loop {
        let index = levels.len();
        let dir = config.level_dir(index);
        if !dir.is_dir() {
            break;
        }

        cleanup_tmp_files(&dir);
        let mut runs = Vec::new();
        for path in run_files(&dir)? {
            let run = SSTableReader::open(&path)?;
            max_ts = max_ts.max(run.timestamp());
            runs.push(run);
        }

        if index == 0 {
            runs.sort_by_key(|r| (r.timestamp(), r.min_key()));
        } else {
            runs.sort_by_key(|r| r.min_key());
        }
        let level = Level::new(runs);
        if index > 0 {
            if let Some((a, b)) = level.first_overlap() {
                return Err(Error::Invariant {
                    level: index,
                    reason: format!(
                        "runs {} and {} overlap",
                        a.path().display(),
                        b.path().display()
                    ),
                });
            }
        }

        debug!(level = index, runs = level.len(), "loaded level");
        levels.push(level);
    }

    if levels.is_empty() {
        levels.push(Level::default());
    }
    drop_stale_level0(&mut levels);
    Ok((levels, max_ts + 1))
}

/// Removes level-0 runs left behind by a compaction that failed to delete
/// them.
///
/// Compacting level 0 consumes every level-0 run and stamps its output with
/// the largest consumed timestamp, so a level-0 run no newer than some
/// deeper run has already been merged down.
fn drop_stale_level0(levels: &mut [Level]) {
    let merged_up_to = match levels
        .iter()
        .skip(1)
        .flat_map(|level| level.runs.iter().map(SSTableReader::timestamp))
        .max()
    {
        Some(ts) => ts,
        None => return,
    };

    let (stale, live): (Vec<_>, Vec<_>) = std::mem::take(&mut levels[0].runs)
        .into_iter()
        .partition(|run| run.timestamp() <= merged_up_to);
    levels[0].runs = live;

    for run in stale {
        warn!(
            path = %run.path().display(),
            timestamp = run.timestamp(),
            "removing level-0 run that was already compacted"
        );
        if let Err(e) = run.delete() {
            warn!(error = %e, "failed to remove stale run");
        }
    }
}

/// Paths of finished run files in `dir`. Other files are ignored.
fn run_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        let is_run = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |name| parse_run_file_name(name).is_some());
        if is_run {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Removes leftover `.sst.tmp` files from interrupted writes.
fn cleanup_tmp_files(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_tmp = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |name| name.ends_with(".sst.tmp"));
        if is_tmp {
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove temp run");
            }
        }
    }
}
