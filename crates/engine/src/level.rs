//! One level of sorted runs, plus a cursor that streams a level lazily.
//!
//! Level 0 keeps runs in flush order (oldest first) and they may overlap.
//! Deeper levels keep runs sorted by `min_key` with disjoint key ranges.

use memtable::Value;
use sstable::{SSTableError, SSTableReader};
use std::ops::Range;

use crate::{LevelSummary, RunSummary};

#[derive(Default)]
pub(crate) struct Level {
    pub(crate) runs: Vec<SSTableReader>,
}

impl Level {
    pub(crate) fn new(runs: Vec<SSTableReader>) -> Self {
        Self { runs }
    }

    /// Maximum number of runs level `index` holds: `2 * 2^index`.
    pub(crate) fn capacity(index: usize) -> usize {
        2usize << index
    }

    pub(crate) fn len(&self) -> usize {
        self.runs.len()
    }

    pub(crate) fn push(&mut self, run: SSTableReader) {
        self.runs.push(run);
    }

    /// Positions of runs intersecting `[min, max]`. Only meaningful for
    /// sorted, disjoint levels.
    pub(crate) fn overlapping(&self, min: u64, max: u64) -> Range<usize> {
        let start = self.runs.partition_point(|r| r.max_key() < min);
        let end = self.runs.partition_point(|r| r.min_key() <= max);
        start..end.max(start)
    }

    /// The run whose range covers `key`, in a sorted, disjoint level.
    pub(crate) fn find(&self, key: u64) -> Option<&SSTableReader> {
        let pos = self.runs.partition_point(|r| r.max_key() < key);
        self.runs.get(pos).filter(|r| r.min_key() <= key)
    }

    /// Removes and returns the runs intersecting `[min, max]`, in key order.
    pub(crate) fn take_overlapping(&mut self, min: u64, max: u64) -> Vec<SSTableReader> {
        let range = self.overlapping(min, max);
        self.runs.drain(range).collect()
    }

    /// Removes the `count` oldest runs (lowest timestamp, then lowest
    /// `min_key`) and returns them sorted by `min_key`.
    pub(crate) fn take_oldest(&mut self, count: usize) -> Vec<SSTableReader> {
        let mut order: Vec<usize> = (0..self.runs.len()).collect();
        order.sort_by_key(|&i| (self.runs[i].timestamp(), self.runs[i].min_key()));
        let mut chosen: Vec<usize> = order.into_iter().take(count).collect();
        chosen.sort_unstable();

        let mut taken: Vec<SSTableReader> = chosen
            .into_iter()
            .rev()
            .map(|i| self.runs.remove(i))
            .collect();
        taken.sort_by_key(|r| r.min_key());
        taken
    }

    /// Adds runs to a sorted level and restores `min_key` order.
    pub(crate) fn absorb(&mut self, runs: Vec<SSTableReader>) {
        self.runs.extend(runs);
        self.runs.sort_by_key(|r| r.min_key());
    }

    /// First pair of neighbouring runs whose ranges touch or cross.
    pub(crate) fn first_overlap(&self) -> Option<(&SSTableReader, &SSTableReader)> {
        self.runs
            .windows(2)
            .find(|w| w[0].max_key() >= w[1].min_key())
            .map(|w| (&w[0], &w[1]))
    }

    pub(crate) fn summary(&self) -> LevelSummary {
        LevelSummary {
            runs: self
                .runs
                .iter()
                .map(|r| RunSummary {
                    timestamp: r.timestamp(),
                    min_key: r.min_key(),
                    max_key: r.max_key(),
                    pairs: r.len() as u64,
                })
                .collect(),
        }
    }
}

/// Smallest and largest key covered by `runs`.
pub(crate) fn span(runs: &[SSTableReader]) -> Option<(u64, u64)> {
    let min = runs.iter().map(SSTableReader::min_key).min()?;
    let max = runs.iter().map(SSTableReader::max_key).max()?;
    Some((min, max))
}

/// Streams records from disjoint runs sorted by `min_key`, loading the next
/// run only once the current one is used up.
pub(crate) struct LevelCursor<'a> {
    runs: &'a [SSTableReader],
    next_run: usize,
    range: Option<(u64, u64)>,
    current: std::vec::IntoIter<(u64, Value)>,
}

impl<'a> LevelCursor<'a> {
    /// With `range`, each run is read with a range scan; otherwise in full.
    pub(crate) fn new(runs: &'a [SSTableReader], range: Option<(u64, u64)>) -> Self {
        Self {
            runs,
            next_run: 0,
            range,
            current: Vec::new().into_iter(),
        }
    }

    fn load(&self, run: &SSTableReader) -> Result<Vec<(u64, Value)>, SSTableError> {
        match self.range {
            Some((start, end)) => run.range_scan(start, end),
            None => run.full_scan(),
        }
    }
}

impl Iterator for LevelCursor<'_> {
    type Item = Result<(u64, Value), SSTableError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(pair) = self.current.next() {
                return Some(Ok(pair));
            }
            let run = self.runs.get(self.next_run)?;
            self.next_run += 1;
            match self.load(run) {
                Ok(entries) => self.current = entries.into_iter(),
                Err(e) => {
                    self.next_run = self.runs.len();
                    return Some(Err(e));
                }
            }
        }
    }
}
