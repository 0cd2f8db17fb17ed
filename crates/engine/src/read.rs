//! Read path: `get()` and `scan()`.
use memtable::Value;
use sstable::{MergeIterator, SSTableError};

use crate::level::LevelCursor;
use crate::{Engine, Result};

type Source<'a> = Box<dyn Iterator<Item = std::result::Result<(u64, Value), SSTableError>> + 'a>;

impl Engine {
    /// Looks up `key`. Deleted and absent keys both return `Ok(None)`.
    pub fn get(&self, key: u64) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.mem.get(key) {
            return Ok(value.as_live().map(<[u8]>::to_vec));
        }
        Ok(self.get_from_levels(key)?.and_then(Value::into_live))
    }

    /// Newest persisted record for `key`, tombstones included.
    pub(crate) fn get_from_levels(&self, key: u64) -> Result<Option<Value>> {
        if let Some(l0) = self.levels.first() {
            for run in l0.runs.iter().rev() {
                if let Some(value) = run.get(key)? {
                    return Ok(Some(value));
                }
            }
        }
        for level in self.levels.iter().skip(1) {
            if let Some(run) = level.find(key) {
                if let Some(value) = run.get(key)? {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }

    /// Live records with keys in `[start, end]`, ascending, one per key.
    ///
    /// Merges the buffer, each overlapping level-0 run (newest first) and a
    /// lazy cursor per deeper level. Higher sources win on equal keys, and
    /// tombstones are dropped only after that resolution.
    pub fn scan(&self, start: u64, end: u64) -> Result<Vec<(u64, Vec<u8>)>> {
        if start > end {
            return Ok(Vec::new());
        }

        let mut sources: Vec<Source<'_>> = Vec::new();
        sources.push(Box::new(
            self.mem.range(start, end).map(|(k, v)| Ok((k, v.clone()))),
        ));

        if let Some(l0) = self.levels.first() {
            for run in l0.runs.iter().rev().filter(|r| r.overlaps(start, end)) {
                sources.push(Box::new(run.range_scan(start, end)?.into_iter().map(Ok)));
            }
        }
        for level in self.levels.iter().skip(1) {
            let hits = &level.runs[level.overlapping(start, end)];
            if !hits.is_empty() {
                sources.push(Box::new(LevelCursor::new(hits, Some((start, end)))));
            }
        }

        let mut out = Vec::new();
        for item in MergeIterator::new(sources)? {
            if let (key, Value::Live(bytes)) = item? {
                out.push((key, bytes));
            }
        }
        Ok(out)
    }
}
