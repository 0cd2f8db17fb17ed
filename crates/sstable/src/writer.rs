use bloom::BloomFilter;
use byteorder::{LittleEndian, WriteBytesExt};
use memtable::Value;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::error::SSTableError;
use crate::format::{
    run_bytes, run_file_name, Header, INDEX_ENTRY_BYTES, RUN_PREFIX_BYTES, TMP_EXTENSION,
};
use crate::SSTableReader;

/// Writes a sorted batch of records to disk as an immutable run.
///
/// Stateless: all work happens in [`write`](SSTableWriter::write). Data goes
/// to `<name>.sst.tmp` first, is fsynced, and is then renamed into place, so
/// a crash never leaves a half-written `.sst` behind.
pub struct SSTableWriter {}

impl SSTableWriter {
    /// Writes `entries` into `dir` as a run stamped with `timestamp` and
    /// returns a reader over the finished file.
    ///
    /// `entries` must be non-empty and strictly ascending by key. Tombstones
    /// are encoded with the reserved marker.
    ///
    /// # Errors
    ///
    /// [`SSTableError::EmptyRun`], [`SSTableError::UnsortedInput`],
    /// [`SSTableError::RunTooLarge`] if an offset would not fit in `u32`, or
    /// [`SSTableError::Io`].
    pub fn write(
        dir: &Path,
        timestamp: u64,
        entries: &[(u64, Value)],
    ) -> Result<SSTableReader, SSTableError> {
        let (min_key, max_key) = match (entries.first(), entries.last()) {
            (Some(first), Some(last)) => (first.0, last.0),
            _ => return Err(SSTableError::EmptyRun),
        };
        for pair in entries.windows(2) {
            if pair[0].0 >= pair[1].0 {
                return Err(SSTableError::UnsortedInput {
                    previous: pair[0].0,
                    key: pair[1].0,
                });
            }
        }
        let total = run_bytes(entries.iter().map(|(_, v)| v));
        if total > u64::from(u32::MAX) {
            return Err(SSTableError::RunTooLarge { bytes: total });
        }

        let header = Header {
            timestamp,
            pairs: entries.len() as u64,
            min_key,
            max_key,
        };
        let filter = BloomFilter::from_keys(entries.iter().map(|(k, _)| *k));

        fs::create_dir_all(dir).map_err(|e| SSTableError::io(dir, e))?;
        let path = dir.join(run_file_name(timestamp, min_key, max_key, header.pairs));
        let tmp_path = path.with_extension(TMP_EXTENSION);

        Self::write_file(&tmp_path, &header, &filter, entries)
            .map_err(|e| SSTableError::io(&tmp_path, e))?;

        fs::rename(&tmp_path, &path).map_err(|e| SSTableError::io(&path, e))?;

        debug!(
            path = %path.display(),
            timestamp,
            pairs = header.pairs,
            bytes = total,
            "wrote run"
        );

        Ok(SSTableReader::from_parts(
            path,
            header,
            filter,
            Self::index_of(entries),
            total,
        ))
    }

    fn write_file(
        tmp_path: &Path,
        header: &Header,
        filter: &BloomFilter,
        entries: &[(u64, Value)],
    ) -> std::io::Result<()> {
        let raw = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp_path)?;
        let mut file = BufWriter::new(raw);

        header.write_to(&mut file)?;
        filter.write_to(&mut file)?;

        let mut offset = header.data_start();
        for (key, value) in entries {
            file.write_u64::<LittleEndian>(*key)?;
            file.write_u32::<LittleEndian>(offset as u32)?;
            offset += value.encoded().len() as u64;
        }
        for (_, value) in entries {
            file.write_all(value.encoded())?;
        }

        file.flush()?;
        file.into_inner()
            .map_err(|e| e.into_error())?
            .sync_all()?;
        Ok(())
    }

    fn index_of(entries: &[(u64, Value)]) -> Vec<crate::IndexEntry> {
        let mut offset = RUN_PREFIX_BYTES + entries.len() as u64 * INDEX_ENTRY_BYTES;
        entries
            .iter()
            .map(|(key, value)| {
                let entry = crate::IndexEntry {
                    key: *key,
                    offset: offset as u32,
                };
                offset += value.encoded().len() as u64;
                entry
            })
            .collect()
    }
}
