//! # Memtable
//!
//! The in-memory write buffer. Recent writes land here until the buffer's
//! estimated encoded size would overflow one sorted run, at which point the
//! engine dumps it to level 0 and resets it.
//!
//! The buffer is a skip list ([`skiplist::SkipList`]) whose node heights come
//! from a deterministic [`LevelGenerator`], so the same sequence of writes
//! always produces the same structure.
mod level_gen;
pub mod skiplist;

pub use level_gen::{Lcg, LevelGenerator};
use skiplist::SkipList;

/// On-disk encoding of a tombstone inside a run's data region.
pub const TOMBSTONE_MARKER: &[u8] = b"~DELETED~";

/// Fixed per-entry cost in a run: key (8 bytes) plus value offset (4 bytes).
pub const ENTRY_OVERHEAD_BYTES: u64 = 8 + 4;

/// A stored value: either live bytes or a delete marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Live(Vec<u8>),
    Tombstone,
}

impl Value {
    /// Decodes the bytes stored in a run.
    pub fn decode(bytes: Vec<u8>) -> Self {
        if bytes == TOMBSTONE_MARKER {
            Value::Tombstone
        } else {
            Value::Live(bytes)
        }
    }

    /// The bytes written to a run's data region.
    #[must_use]
    pub fn encoded(&self) -> &[u8] {
        match self {
            Value::Live(v) => v,
            Value::Tombstone => TOMBSTONE_MARKER,
        }
    }

    /// Encoded size of this entry in a run (value bytes + key + offset).
    #[must_use]
    pub fn footprint(&self) -> u64 {
        self.encoded().len() as u64 + ENTRY_OVERHEAD_BYTES
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Value::Tombstone)
    }

    #[must_use]
    pub fn as_live(&self) -> Option<&[u8]> {
        match self {
            Value::Live(v) => Some(v),
            Value::Tombstone => None,
        }
    }

    pub fn into_live(self) -> Option<Vec<u8>> {
        match self {
            Value::Live(v) => Some(v),
            Value::Tombstone => None,
        }
    }
}

/// The full sorted contents of a buffer, ready to become a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dump {
    pub entries: Vec<(u64, Value)>,
    pub min_key: u64,
    pub max_key: u64,
}

impl Dump {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered write buffer with approximate encoded-size accounting.
///
/// `approx_size` starts at `base_size` (the fixed bytes every run pays for
/// its header and filter) and grows by [`Value::footprint`] per entry.
pub struct Memtable {
    list: SkipList,
    base_size: u64,
    approx_size: u64,
}

impl Memtable {
    /// Creates a buffer using the default [`Lcg`] seed.
    pub fn new(base_size: u64) -> Self {
        Self::with_generator(base_size, Box::new(Lcg::default()))
    }

    pub fn with_seed(base_size: u64, seed: u64) -> Self {
        Self::with_generator(base_size, Box::new(Lcg::new(seed)))
    }

    pub fn with_generator(base_size: u64, generator: Box<dyn LevelGenerator>) -> Self {
        Self {
            list: SkipList::new(generator),
            base_size,
            approx_size: base_size,
        }
    }

    /// Inserts or overwrites `key`.
    pub fn put(&mut self, key: u64, value: Value) {
        self.approx_size += value.footprint();
        if let Some(old) = self.list.insert(key, value) {
            self.approx_size = self.approx_size.saturating_sub(old.footprint());
        }
    }

    /// Returns the stored value, tombstones included.
    pub fn get(&self, key: u64) -> Option<&Value> {
        self.list.get(key)
    }

    /// Physically removes `key`.
    ///
    /// Returns `false` if the key is absent or currently holds a tombstone
    /// (which is left in place).
    pub fn del(&mut self, key: u64) -> bool {
        match self.list.get(key) {
            None | Some(Value::Tombstone) => false,
            Some(Value::Live(_)) => {
                if let Some(old) = self.list.remove(key) {
                    self.approx_size = self.approx_size.saturating_sub(old.footprint());
                }
                true
            }
        }
    }

    /// Live entries with keys in `[start, end]`, ascending.
    pub fn scan(&self, start: u64, end: u64) -> Vec<(u64, Vec<u8>)> {
        self.list
            .range(start, end)
            .filter_map(|(k, v)| v.as_live().map(|bytes| (k, bytes.to_vec())))
            .collect()
    }

    /// Entries with keys in `[start, end]`, ascending, tombstones included.
    pub fn range(&self, start: u64, end: u64) -> impl Iterator<Item = (u64, &Value)> {
        self.list.range(start, end)
    }

    /// Ordered iterator over every entry.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Value)> {
        self.list.iter()
    }

    /// Copies out every entry in key order, or `None` when empty.
    pub fn dump_all(&self) -> Option<Dump> {
        let entries: Vec<(u64, Value)> = self.list.iter().map(|(k, v)| (k, v.clone())).collect();
        let min_key = entries.first()?.0;
        let max_key = entries.last()?.0;
        Some(Dump {
            entries,
            min_key,
            max_key,
        })
    }

    /// Drops every entry and restores the size counter to the base.
    pub fn reset(&mut self) {
        self.list.clear();
        self.approx_size = self.base_size;
    }

    pub fn approx_size(&self) -> u64 {
        self.approx_size
    }

    pub fn base_size(&self) -> u64 {
        self.base_size
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Height of the underlying skip list.
    pub fn height(&self) -> usize {
        self.list.height()
    }
}

impl std::fmt::Debug for Memtable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memtable")
            .field("entries", &self.list.len())
            .field("approx_size", &self.approx_size)
            .field("height", &self.list.height())
            .finish()
    }
}
