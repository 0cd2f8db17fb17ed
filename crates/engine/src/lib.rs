//! # Engine - lsmkv storage engine
//!
//! Ties the [`memtable`] and [`sstable`] crates together into a leveled
//! LSM-tree key-value store with `u64` keys and byte-string values.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → Memtable insert                    │
//! │              |                                │
//! │              |  (next entry overflows a run?) │
//! │              |            yes                 │
//! │              v                                │
//! │           flush() → new level-0 run           │
//! │              |                                │
//! │              |  (level i holds > 2*2^i runs?) │
//! │              |            yes                 │
//! │              v                                │
//! │   compaction.rs → merged runs in level i+1    │
//! │                                               │
//! │ read.rs → Memtable → L0 (newest first)        │
//! │            → L1 → L2 ...  (first match wins)  │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                              |
//! |----------------|------------------------------------------------------|
//! | `lib.rs`       | `Engine` struct, `open`, accessors, `Debug`           |
//! | [`recovery`]   | rebuilds levels from the data directory               |
//! | [`write`]      | `put()`, `del()`, `force_flush()`, internal `flush()` |
//! | [`read`]       | `get()`, `scan()`                                     |
//! | [`compaction`] | per-level compaction with streaming output            |
//! | [`level`]      | level bookkeeping and the lazy level cursor           |
//!
//! ## Levels
//!
//! ```text
//! ┌────────────────────────────┐  ← freshest, checked first
//! │ MEMTABLE                   │
//! ├────────────────────────────┤  ← from flushes (may overlap), cap 2
//! │ level-0 runs               │
//! ├────────────────────────────┤  ← from compaction (disjoint), cap 4
//! │ level-1 runs               │
//! ├────────────────────────────┤  ← cap 8, 16, ...
//! │ level-2 ...                │
//! └────────────────────────────┘
//! ```
//!
//! ## Durability
//!
//! The write buffer is volatile. Data becomes durable once a run holding it
//! has been fully written and renamed into place. Nothing is flushed on drop.
mod compaction;
mod error;
mod level;
mod read;
mod recovery;
mod write;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use memtable::Value;

use level::Level;
use memtable::{Memtable, ENTRY_OVERHEAD_BYTES, TOMBSTONE_MARKER};
use sstable::RUN_PREFIX_BYTES;
use std::path::Path;
use tracing::info;

/// Smallest usable run size: the fixed prefix plus one tombstone entry.
pub const MIN_RUN_BYTES: u64 = RUN_PREFIX_BYTES + ENTRY_OVERHEAD_BYTES + TOMBSTONE_MARKER.len() as u64;

/// Shape of one run, as reported by [`Engine::levels`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub timestamp: u64,
    pub min_key: u64,
    pub max_key: u64,
    pub pairs: u64,
}

/// Runs of one level, in stored order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSummary {
    pub runs: Vec<RunSummary>,
}

/// The storage engine: one write buffer over a stack of leveled runs.
///
/// # Write Path
///
/// 1. Reject values that could never fit in a run, and the reserved marker.
/// 2. If the entry would push the buffer past `max_run_bytes`, flush the
///    buffer to a new level-0 run and compact levels that overflow.
/// 3. Insert into the buffer.
///
/// # Read Path
///
/// 1. Check the buffer (tombstones count as hits).
/// 2. Check level 0 newest to oldest, then each deeper level.
/// 3. First match wins; a tombstone reads as "not found".
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) mem: Memtable,
    /// `levels[0]` always exists; deeper levels are created on demand.
    pub(crate) levels: Vec<Level>,
    /// Timestamp assigned to the next flushed run.
    pub(crate) next_ts: u64,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("data_dir", &self.config.data_dir)
            .field("max_run_bytes", &self.config.max_run_bytes)
            .field("next_ts", &self.next_ts)
            .field("buffer_size", &self.mem.approx_size())
            .field("buffer_entries", &self.mem.len())
            .field(
                "runs_per_level",
                &self.levels.iter().map(Level::len).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Engine {
    /// Opens an engine over `config.data_dir`, loading any runs already
    /// there.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `max_run_bytes` is below [`MIN_RUN_BYTES`] or
    /// above `u32::MAX`; errors from [`recovery`] or from compacting a
    /// level loaded over capacity otherwise.
    pub fn open(config: EngineConfig) -> Result<Self> {
        if config.max_run_bytes < MIN_RUN_BYTES {
            return Err(Error::Config(format!(
                "max_run_bytes {} is below the minimum {}",
                config.max_run_bytes, MIN_RUN_BYTES
            )));
        }
        if config.max_run_bytes > u64::from(u32::MAX) {
            return Err(Error::Config(format!(
                "max_run_bytes {} does not fit 32-bit offsets",
                config.max_run_bytes
            )));
        }

        let (levels, next_ts) = recovery::load_levels(&config)?;
        let mem = Memtable::with_seed(RUN_PREFIX_BYTES, config.skiplist_seed);

        let mut engine = Self {
            config,
            mem,
            levels,
            next_ts,
        };
        // A run set left over capacity by an interrupted compaction.
        engine.check_compaction()?;
        info!(
            data_dir = %engine.config.data_dir.display(),
            levels = engine.levels.len(),
            runs = engine.run_count(),
            next_ts = engine.next_ts,
            "engine opened"
        );
        Ok(engine)
    }

    /// Opens an engine over `dir` with default settings.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::open(EngineConfig::new(dir))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of levels, empty ones included.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Total number of runs across all levels.
    pub fn run_count(&self) -> usize {
        self.levels.iter().map(Level::len).sum()
    }

    pub fn levels(&self) -> Vec<LevelSummary> {
        self.levels.iter().map(Level::summary).collect()
    }

    pub fn next_timestamp(&self) -> u64 {
        self.next_ts
    }

    /// Estimated encoded size of the buffer, run prefix included.
    pub fn buffer_size(&self) -> u64 {
        self.mem.approx_size()
    }

    pub fn buffer_len(&self) -> usize {
        self.mem.len()
    }

    /// Maximum number of runs level `index` may hold after compaction.
    pub fn level_capacity(index: usize) -> usize {
        Level::capacity(index)
    }
}

#[cfg(test)]
mod tests;
