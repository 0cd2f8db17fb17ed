//! Leveled compaction.
//!
//! After every flush, each level holding more than `2 * 2^i` runs pushes
//! runs down into level `i + 1`:
//!
//! - level 0 moves *all* of its runs, merged newest first;
//! - deeper levels move only their oldest runs, as many as overflow.
//!
//! Overlapping runs from the target level join the merge and are rewritten.
//! Output is chunked into runs of at most `max_run_bytes` and carries the
//! largest input timestamp. Tombstones are dropped only when the target is
//! the deepest level.

use memtable::Value;
use sstable::{MergeIterator, SSTableError, SSTableReader, SSTableWriter, RUN_PREFIX_BYTES};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::level::{span, Level, LevelCursor};
use crate::{Engine, Error, Result};

type Source<'a> = Box<dyn Iterator<Item = std::result::Result<(u64, Value), SSTableError>> + 'a>;

/// Buffers merged records and writes them out one run at a time.
struct RunSink {
    dir: PathBuf,
    timestamp: u64,
    limit: u64,
    pending: Vec<(u64, Value)>,
    pending_bytes: u64,
    written: Vec<SSTableReader>,
}

impl RunSink {
    fn new(dir: PathBuf, timestamp: u64, limit: u64) -> Self {
        Self {
            dir,
            timestamp,
            limit,
            pending: Vec::new(),
            pending_bytes: RUN_PREFIX_BYTES,
            written: Vec::new(),
        }
    }

    fn push(&mut self, key: u64, value: Value) -> std::result::Result<(), SSTableError> {
        let bytes = value.footprint();
        if !self.pending.is_empty() && self.pending_bytes + bytes > self.limit {
            self.cut()?;
        }
        self.pending.push((key, value));
        self.pending_bytes += bytes;
        Ok(())
    }

    fn cut(&mut self) -> std::result::Result<(), SSTableError> {
        let run = SSTableWriter::write(&self.dir, self.timestamp, &self.pending)?;
        self.written.push(run);
        self.pending.clear();
        self.pending_bytes = RUN_PREFIX_BYTES;
        Ok(())
    }

    /// Writes out whatever is still pending.
    fn finish(&mut self) -> std::result::Result<(), SSTableError> {
        if !self.pending.is_empty() {
            self.cut()?;
        }
        Ok(())
    }

    fn into_runs(self) -> Vec<SSTableReader> {
        self.written
    }

    /// Deletes whatever was already written, except files that were renamed
    /// over one of the `inputs`: those now hold the merged records.
    fn abandon(self, inputs: &HashSet<PathBuf>) {
        for run in self.written {
            if inputs.contains(run.path()) {
                continue;
            }
            if let Err(e) = run.delete() {
                warn!(error = %e, "failed to remove partial compaction output");
            }
        }
    }
}

/// Streams `sources` through a k-way merge into runs under `dir`.
/// `inputs` are the paths of the runs being merged.
fn merge_into(
    sources: Vec<Source<'_>>,
    inputs: &HashSet<PathBuf>,
    dir: &Path,
    timestamp: u64,
    limit: u64,
    drop_tombstones: bool,
) -> Result<Vec<SSTableReader>> {
    let mut sink = RunSink::new(dir.to_path_buf(), timestamp, limit);
    let merged = MergeIterator::new(sources).and_then(|merge| {
        for item in merge {
            let (key, value) = item?;
            if drop_tombstones && value.is_tombstone() {
                continue;
            }
            sink.push(key, value)?;
        }
        sink.finish()
    });
    match merged {
        Ok(()) => Ok(sink.into_runs()),
        Err(e) => {
            sink.abandon(inputs);
            Err(e.into())
        }
    }
}

/// Re-reads `runs` from disk after a failed merge, which may have renamed
/// an output over one of them. A run that fails to reopen keeps its old
/// handle.
fn reload(runs: Vec<SSTableReader>) -> Vec<SSTableReader> {
    runs.into_iter()
        .map(|run| match SSTableReader::open(run.path()) {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(path = %run.path().display(), error = %e, "failed to reload run");
                run
            }
        })
        .collect()
}

impl Engine {
    /// Walks levels from 0 upward, compacting each one that holds more runs
    /// than its capacity.
    pub(crate) fn check_compaction(&mut self) -> Result<()> {
        let mut index = 0;
        while index < self.levels.len() {
            let count = self.levels[index].len();
            let capacity = Level::capacity(index);
            if count > capacity {
                if index == 0 {
                    self.compact_level0()?;
                } else {
                    self.compact_level(index, count - capacity)?;
                }
            }
            index += 1;
        }
        Ok(())
    }

    /// Creates levels (and their directories) up to `index`.
    pub(crate) fn ensure_level(&mut self, index: usize) -> Result<()> {
        while self.levels.len() <= index {
            let dir = self.config.level_dir(self.levels.len());
            fs::create_dir_all(&dir).map_err(|e| Error::io(dir, e))?;
            self.levels.push(Level::default());
        }
        Ok(())
    }

    /// Moves every level-0 run into level 1.
    fn compact_level0(&mut self) -> Result<()> {
        self.ensure_level(1)?;
        let upper = std::mem::take(&mut self.levels[0].runs);
        let (min, max) = match span(&upper) {
            Some(span) => span,
            None => return Ok(()),
        };
        let lower = self.levels[1].take_overlapping(min, max);

        match self.merge_down(0, &upper, &lower) {
            Ok(outputs) => self.install(0, upper, lower, outputs),
            Err(e) => {
                self.levels[0].runs = upper;
                self.levels[1].absorb(reload(lower));
                Err(e)
            }
        }
    }

    /// Moves the `excess` oldest runs of `index` (>= 1) into `index + 1`.
    fn compact_level(&mut self, index: usize, excess: usize) -> Result<()> {
        self.ensure_level(index + 1)?;
        let upper = self.levels[index].take_oldest(excess);
        let (min, max) = match span(&upper) {
            Some(span) => span,
            None => return Ok(()),
        };
        let lower = self.levels[index + 1].take_overlapping(min, max);

        match self.merge_down(index, &upper, &lower) {
            Ok(outputs) => self.install(index, upper, lower, outputs)?,
            Err(e) => {
                self.levels[index].absorb(upper);
                self.levels[index + 1].absorb(reload(lower));
                return Err(e);
            }
        }

        let remaining = self.levels[index].len();
        let capacity = Level::capacity(index);
        if remaining != capacity {
            return Err(Error::Invariant {
                level: index,
                reason: format!(
                    "holds {} runs after compaction, expected {}",
                    remaining, capacity
                ),
            });
        }
        Ok(())
    }

    /// Merges `upper` (from level `from`) with `lower` (from `from + 1`)
    /// into new runs for `from + 1`. Upper records win on equal keys.
    pub(crate) fn merge_down(
        &self,
        from: usize,
        upper: &[SSTableReader],
        lower: &[SSTableReader],
    ) -> Result<Vec<SSTableReader>> {
        let mut sources: Vec<Source<'_>> = Vec::with_capacity(upper.len() + 1);
        if from == 0 {
            // Level 0 runs may overlap: one source each, newest first.
            for run in upper.iter().rev() {
                sources.push(Box::new(LevelCursor::new(std::slice::from_ref(run), None)));
            }
        } else {
            sources.push(Box::new(LevelCursor::new(upper, None)));
        }
        sources.push(Box::new(LevelCursor::new(lower, None)));

        let target = from + 1;
        let timestamp = upper
            .iter()
            .chain(lower)
            .map(SSTableReader::timestamp)
            .max()
            .unwrap_or(0);
        let drop_tombstones = target + 1 == self.levels.len();

        let inputs: HashSet<PathBuf> = upper
            .iter()
            .chain(lower)
            .map(|r| r.path().to_path_buf())
            .collect();

        merge_into(
            sources,
            &inputs,
            &self.config.level_dir(target),
            timestamp,
            self.config.max_run_bytes,
            drop_tombstones,
        )
    }

    /// Files the outputs into `from + 1`, then deletes the consumed runs.
    ///
    /// A failed delete does not undo the install: the levels stay
    /// consistent and the first failure is returned once every other run
    /// has been handled.
    pub(crate) fn install(
        &mut self,
        from: usize,
        upper: Vec<SSTableReader>,
        lower: Vec<SSTableReader>,
        outputs: Vec<SSTableReader>,
    ) -> Result<()> {
        let target = from + 1;
        let consumed = upper.len() + lower.len();
        let produced = outputs.len();

        // An output may have replaced a consumed file of the same name.
        let kept: HashSet<PathBuf> = outputs.iter().map(|r| r.path().to_path_buf()).collect();
        self.levels[target].absorb(outputs);

        let mut failure = None;
        for run in upper.into_iter().chain(lower) {
            if kept.contains(run.path()) {
                continue;
            }
            if let Err(e) = run.delete() {
                warn!(error = %e, "failed to remove compacted run");
                failure.get_or_insert(e);
            }
        }

        info!(
            from,
            to = target,
            consumed,
            produced,
            runs_in_target = self.levels[target].len(),
            "compacted level"
        );
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
