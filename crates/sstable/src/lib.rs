//! # SSTable - sorted runs
//!
//! Immutable, on-disk sorted runs for the lsmkv storage engine.
//!
//! When the in-memory [`memtable::Memtable`] would outgrow one run the engine
//! dumps it to disk as a run. Runs are *write-once, read-many*: once created
//! they are never modified, only replaced during compaction.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ HEADER (32 bytes)                                             │
//! │ timestamp (u64) | pairs (u64) | min_key (u64) | max_key (u64) │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FILTER (10240 bytes)                                          │
//! │ packed bloom bitmap, bit i in byte i/8 at bit i%8             │
//! ├───────────────────────────────────────────────────────────────┤
//! │ INDEX (pairs x 12 bytes)                                      │
//! │ key (u64) | value_offset (u32)                                │
//! │ ... ascending by key ...                                      │
//! ├───────────────────────────────────────────────────────────────┤
//! │ DATA                                                          │
//! │ value bytes, concatenated; each value ends where the next     │
//! │ begins, the last one at end-of-file                           │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Value offsets are absolute file offsets.
//! A tombstone is stored as the value [`memtable::TOMBSTONE_MARKER`].
//!
//! Runs are named `"<timestamp> <min_key>-<max_key> <pairs>.sst"`.

mod error;
mod format;
mod merge;
mod reader;
mod writer;

pub use error::SSTableError;
pub use format::{
    entry_bytes, parse_run_file_name, run_bytes, run_file_name, Header, FILTER_BYTES,
    HEADER_BYTES, INDEX_ENTRY_BYTES, RUN_EXTENSION, RUN_PREFIX_BYTES, TMP_EXTENSION,
};
pub use merge::MergeIterator;
pub use reader::{IndexEntry, SSTableReader};
pub use writer::SSTableWriter;

#[cfg(test)]
mod tests;
