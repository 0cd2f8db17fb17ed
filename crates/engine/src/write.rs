//! Write path: `put()`, `del()`, `force_flush()`, and the internal `flush()`.
use memtable::{Value, TOMBSTONE_MARKER};
use sstable::{SSTableWriter, RUN_PREFIX_BYTES};
use std::fs;
use std::io::ErrorKind;
use tracing::{debug, info};

use crate::level::Level;
use crate::{Engine, Error, Result};

impl Engine {
    /// Inserts or overwrites `key`.
    ///
    /// Flushes the buffer first when this entry would push it past
    /// `max_run_bytes`; a flush may cascade into compactions.
    ///
    /// # Errors
    ///
    /// [`Error::ReservedValue`] if `value` is the tombstone marker,
    /// [`Error::ValueTooLarge`] if the entry alone overflows a run, and any
    /// flush or compaction failure.
    pub fn put(&mut self, key: u64, value: impl Into<Vec<u8>>) -> Result<()> {
        let value = value.into();
        if value == TOMBSTONE_MARKER {
            return Err(Error::ReservedValue { key });
        }
        self.put_value(key, Value::Live(value))
    }

    pub(crate) fn put_value(&mut self, key: u64, value: Value) -> Result<()> {
        let footprint = value.footprint();
        let limit = self.config.max_run_bytes;
        let needed = RUN_PREFIX_BYTES + footprint;
        if needed > limit {
            return Err(Error::ValueTooLarge { key, needed, limit });
        }

        if self.mem.approx_size() + footprint > limit {
            self.flush()?;
        }
        self.mem.put(key, value);
        Ok(())
    }

    /// Deletes `key`. Returns `false` if it was absent or already deleted.
    ///
    /// A live buffered value that shadows nothing on disk is unlinked from
    /// the buffer; everything else is shadowed with a tombstone.
    pub fn del(&mut self, key: u64) -> Result<bool> {
        let buffered_tombstone = self.mem.get(key).map(Value::is_tombstone);
        match buffered_tombstone {
            Some(true) => Ok(false),
            Some(false) => {
                let persisted_live = matches!(self.get_from_levels(key)?, Some(Value::Live(_)));
                if persisted_live {
                    self.put_value(key, Value::Tombstone)?;
                } else {
                    self.mem.del(key);
                }
                Ok(true)
            }
            None => match self.get_from_levels(key)? {
                Some(Value::Live(_)) => {
                    self.put_value(key, Value::Tombstone)?;
                    Ok(true)
                }
                _ => Ok(false),
            },
        }
    }

    /// Flushes the buffer to level 0 even if it is not full. No-op when empty.
    pub fn force_flush(&mut self) -> Result<()> {
        self.flush()
    }

    /// Writes the buffer as a new level-0 run, clears it, then runs the
    /// compaction check.
    pub(crate) fn flush(&mut self) -> Result<()> {
        let dump = match self.mem.dump_all() {
            Some(dump) => dump,
            None => return Ok(()),
        };

        let timestamp = self.next_ts;
        let run = SSTableWriter::write(&self.config.level_dir(0), timestamp, &dump.entries)?;
        self.next_ts += 1;

        debug!(
            timestamp,
            pairs = dump.len(),
            min_key = dump.min_key,
            max_key = dump.max_key,
            bytes = self.mem.approx_size(),
            "flushed write buffer"
        );

        self.levels[0].push(run);
        self.mem.reset();
        self.check_compaction()
    }

    /// Drops every record: clears the buffer, deletes all runs and level
    /// directories, and restarts timestamps at 1.
    pub fn reset(&mut self) -> Result<()> {
        self.mem.reset();
        let levels = std::mem::replace(&mut self.levels, vec![Level::default()]);
        self.next_ts = 1;

        for (index, level) in levels.into_iter().enumerate() {
            for run in level.runs {
                run.delete()?;
            }
            let dir = self.config.level_dir(index);
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(dir, e)),
            }
        }

        info!(data_dir = %self.config.data_dir.display(), "engine reset");
        Ok(())
    }
}
