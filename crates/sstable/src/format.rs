//! Run file constants, the fixed header, and file naming.
//!
//! ```text
//! offset 0      [timestamp: u64][pairs: u64][min_key: u64][max_key: u64]
//! offset 32     [filter bitmap: 10240 bytes]
//! offset 10272  [key: u64][value_offset: u32] x pairs
//! ...           [value bytes, concatenated]
//! ```
//!
//! `value_offset` is measured from the start of the file. An entry's value
//! ends where the next entry's begins, or at end-of-file for the last one.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memtable::Value;
use std::io::{Read, Result as IoResult, Write};

/// Size of the fixed header: four `u64` fields.
pub const HEADER_BYTES: u64 = 4 * 8;

/// Size of the packed filter bitmap.
pub const FILTER_BYTES: u64 = bloom::FILTER_BYTES as u64;

/// Size of one index entry: key (`u64`) + value offset (`u32`).
pub const INDEX_ENTRY_BYTES: u64 = 8 + 4;

/// Bytes every run pays before its first index entry.
pub const RUN_PREFIX_BYTES: u64 = HEADER_BYTES + FILTER_BYTES;

/// Extension of a finished run file.
pub const RUN_EXTENSION: &str = "sst";

/// Extension of a run file that is still being written.
pub const TMP_EXTENSION: &str = "sst.tmp";

/// The fixed 32-byte header at the start of every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub timestamp: u64,
    pub pairs: u64,
    pub min_key: u64,
    pub max_key: u64,
}

impl Header {
    pub fn write_to<W: Write>(&self, w: &mut W) -> IoResult<()> {
        w.write_u64::<LittleEndian>(self.timestamp)?;
        w.write_u64::<LittleEndian>(self.pairs)?;
        w.write_u64::<LittleEndian>(self.min_key)?;
        w.write_u64::<LittleEndian>(self.max_key)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> IoResult<Self> {
        Ok(Self {
            timestamp: r.read_u64::<LittleEndian>()?,
            pairs: r.read_u64::<LittleEndian>()?,
            min_key: r.read_u64::<LittleEndian>()?,
            max_key: r.read_u64::<LittleEndian>()?,
        })
    }

    /// Offset of the first value byte.
    #[must_use]
    pub fn data_start(&self) -> u64 {
        RUN_PREFIX_BYTES + self.pairs * INDEX_ENTRY_BYTES
    }
}

/// File name of a run: `"<timestamp> <min_key>-<max_key> <pairs>.sst"`.
#[must_use]
pub fn run_file_name(timestamp: u64, min_key: u64, max_key: u64, pairs: u64) -> String {
    format!(
        "{} {}-{} {}.{}",
        timestamp, min_key, max_key, pairs, RUN_EXTENSION
    )
}

/// Parses a name produced by [`run_file_name`] back into
/// `(timestamp, min_key, max_key, pairs)`.
#[must_use]
pub fn parse_run_file_name(name: &str) -> Option<(u64, u64, u64, u64)> {
    let stem = name.strip_suffix(".sst")?;
    let mut parts = stem.split(' ');
    let timestamp = parts.next()?.parse().ok()?;
    let (min, max) = parts.next()?.split_once('-')?;
    let pairs = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((timestamp, min.parse().ok()?, max.parse().ok()?, pairs))
}

/// Bytes one record adds to a run (index entry + encoded value).
#[must_use]
pub fn entry_bytes(value: &Value) -> u64 {
    value.footprint()
}

/// Total encoded size of a run holding `entries`.
pub fn run_bytes<'a, I>(entries: I) -> u64
where
    I: IntoIterator<Item = &'a Value>,
{
    RUN_PREFIX_BYTES + entries.into_iter().map(entry_bytes).sum::<u64>()
}
