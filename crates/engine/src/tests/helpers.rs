use crate::*;
use std::fs;
use std::path::Path;

/// Run size small enough that a few hundred short records force flushes
/// and compactions.
pub const SMALL_RUN_BYTES: u64 = 16 * 1024;

pub fn small_config(dir: &Path) -> EngineConfig {
    EngineConfig::new(dir).with_max_run_bytes(SMALL_RUN_BYTES)
}

pub fn open_small(dir: &Path) -> Result<Engine> {
    Engine::open(small_config(dir))
}

/// `"s"` repeated `n` times.
pub fn s_value(n: usize) -> Vec<u8> {
    vec![b's'; n]
}

pub fn count_run_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| {
                    e.path()
                        .extension()
                        .and_then(|s| s.to_str())
                        .map(|ext| ext == "sst")
                        .unwrap_or(false)
                })
                .count()
        })
        .unwrap_or(0)
}

/// Panics unless every level respects its capacity and every level >= 1
/// holds disjoint runs in ascending order.
pub fn assert_level_invariants(engine: &Engine) {
    for (index, level) in engine.levels().iter().enumerate() {
        assert!(
            level.runs.len() <= Engine::level_capacity(index),
            "level {} holds {} runs, capacity {}",
            index,
            level.runs.len(),
            Engine::level_capacity(index)
        );
        for run in &level.runs {
            assert!(run.pairs > 0);
            assert!(run.min_key <= run.max_key);
        }
        if index > 0 {
            for pair in level.runs.windows(2) {
                assert!(
                    pair[0].max_key < pair[1].min_key,
                    "level {} runs overlap: {:?} / {:?}",
                    index,
                    pair[0],
                    pair[1]
                );
            }
        }
    }
}

/// Files on disk agree with the in-memory level structure.
pub fn assert_files_match_levels(engine: &Engine) {
    for (index, level) in engine.levels().iter().enumerate() {
        assert_eq!(
            count_run_files(&engine.config().level_dir(index)),
            level.runs.len(),
            "level {} file count",
            index
        );
    }
}
