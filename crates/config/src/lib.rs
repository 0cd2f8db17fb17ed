//! # Config
//!
//! Engine settings shared by the `engine` crate and the `cli` shell.
//!
//! Every field has a default; the shell overrides them from the environment:
//!
//! ```text
//! LSMKV_DATA_DIR       data directory            (default: "data")
//! LSMKV_MAX_RUN_KB     maximum run size in KiB   (default: 2048 = 2 MiB)
//! LSMKV_SKIPLIST_SEED  write buffer level seed   (default: 1)
//! ```
use std::path::{Path, PathBuf};

/// Default maximum size of one sorted run, in bytes (2 MiB).
pub const DEFAULT_MAX_RUN_BYTES: u64 = 2 * 1024 * 1024;

/// Default seed for the write buffer's level generator.
pub const DEFAULT_SKIPLIST_SEED: u64 = 1;

/// Default data directory used when nothing else is configured.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Settings for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Root directory holding one `level-<i>` subdirectory per level.
    pub data_dir: PathBuf,
    /// Upper bound on the encoded size of a single run. Also the write
    /// buffer's flush threshold.
    pub max_run_bytes: u64,
    /// Seed for the write buffer's deterministic level generator.
    pub skiplist_seed: u64,
}

impl EngineConfig {
    /// Creates a config rooted at `data_dir` with default limits.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            max_run_bytes: DEFAULT_MAX_RUN_BYTES,
            skiplist_seed: DEFAULT_SKIPLIST_SEED,
        }
    }

    /// Builds a config from `LSMKV_*` environment variables. Unset or
    /// unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let data_dir = env_or("LSMKV_DATA_DIR", DEFAULT_DATA_DIR);
        let max_run_kb: u64 = env_or("LSMKV_MAX_RUN_KB", "2048")
            .parse()
            .unwrap_or(DEFAULT_MAX_RUN_BYTES / 1024);
        let seed: u64 = env_or("LSMKV_SKIPLIST_SEED", "1")
            .parse()
            .unwrap_or(DEFAULT_SKIPLIST_SEED);

        Self::new(data_dir)
            .with_max_run_bytes(max_run_kb.saturating_mul(1024))
            .with_skiplist_seed(seed)
    }

    /// Overrides the maximum run size.
    #[must_use]
    pub fn with_max_run_bytes(mut self, bytes: u64) -> Self {
        self.max_run_bytes = bytes;
        self
    }

    /// Overrides the level generator seed.
    #[must_use]
    pub fn with_skiplist_seed(mut self, seed: u64) -> Self {
        self.skiplist_seed = seed;
        self
    }

    /// Directory of level `level`: `<data_dir>/level-<level>`.
    #[must_use]
    pub fn level_dir(&self, level: usize) -> PathBuf {
        self.data_dir.join(format!("level-{}", level))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::new("/tmp/x");
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/x"));
        assert_eq!(cfg.max_run_bytes, 2 * 1024 * 1024);
        assert_eq!(cfg.skiplist_seed, 1);
    }

    #[test]
    fn builders_override() {
        let cfg = EngineConfig::new("d")
            .with_max_run_bytes(16 * 1024)
            .with_skiplist_seed(99);
        assert_eq!(cfg.max_run_bytes, 16 * 1024);
        assert_eq!(cfg.skiplist_seed, 99);
    }

    #[test]
    fn level_dir_layout() {
        let cfg = EngineConfig::new("root");
        assert_eq!(cfg.level_dir(0), PathBuf::from("root").join("level-0"));
        assert_eq!(cfg.level_dir(3), PathBuf::from("root").join("level-3"));
    }

    #[test]
    fn from_env_reads_overrides() {
        std::env::set_var("LSMKV_DATA_DIR", "env-dir");
        std::env::set_var("LSMKV_MAX_RUN_KB", "16");
        std::env::set_var("LSMKV_SKIPLIST_SEED", "not-a-number");

        let cfg = EngineConfig::from_env();
        assert_eq!(cfg.data_dir, PathBuf::from("env-dir"));
        assert_eq!(cfg.max_run_bytes, 16 * 1024);
        assert_eq!(cfg.skiplist_seed, DEFAULT_SKIPLIST_SEED);

        std::env::remove_var("LSMKV_DATA_DIR");
        std::env::remove_var("LSMKV_MAX_RUN_KB");
        std::env::remove_var("LSMKV_SKIPLIST_SEED");
    }
}
