use super::helpers::{assert_files_match_levels, assert_level_invariants};
use crate::*;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tempfile::tempdir;

const MODEL_RUN_BYTES: u64 = 12 * 1024;
const KEY_SPACE: u64 = 600;

fn random_value(rng: &mut StdRng) -> Vec<u8> {
    let len = rng.gen_range(0..96);
    (0..len).map(|_| rng.gen_range(b'a'..=b'z')).collect()
}

/// Drives the engine and a `BTreeMap` with the same random operations and
/// checks that every answer agrees.
fn run_model(seed: u64, ops: usize) -> Result<()> {
    let dir = tempdir()?;
    let config = EngineConfig::new(dir.path())
        .with_max_run_bytes(MODEL_RUN_BYTES)
        .with_skiplist_seed(seed);
    let mut engine = Engine::open(config)?;
    let mut model: BTreeMap<u64, Vec<u8>> = BTreeMap::new();
    let mut rng = StdRng::seed_from_u64(seed);

    for step in 0..ops {
        let key = rng.gen_range(0..KEY_SPACE);
        match rng.gen_range(0..100) {
            0..=44 => {
                let value = random_value(&mut rng);
                engine.put(key, value.clone())?;
                model.insert(key, value);
            }
            45..=64 => {
                let expected = model.remove(&key).is_some();
                assert_eq!(engine.del(key)?, expected, "step {} del {}", step, key);
            }
            65..=89 => {
                assert_eq!(engine.get(key)?, model.get(&key).cloned(), "step {} get {}", step, key);
            }
            90..=97 => {
                let end = key.saturating_add(rng.gen_range(0..64));
                let expected: Vec<(u64, Vec<u8>)> =
                    model.range(key..=end).map(|(k, v)| (*k, v.clone())).collect();
                assert_eq!(engine.scan(key, end)?, expected, "step {} scan {}..={}", step, key, end);
            }
            _ => engine.force_flush()?,
        }

        if step % 250 == 0 {
            assert_level_invariants(&engine);
        }
    }

    engine.force_flush()?;
    assert_level_invariants(&engine);
    assert_files_match_levels(&engine);
    let everything: Vec<(u64, Vec<u8>)> = model.iter().map(|(k, v)| (*k, v.clone())).collect();
    assert_eq!(engine.scan(0, u64::MAX)?, everything);
    Ok(())
}

// --------------------- Randomized ---------------------

#[test]
fn random_ops_match_btreemap() -> Result<()> {
    for seed in [1, 7, 42] {
        run_model(seed, 4_000)?;
    }
    Ok(())
}

#[test]
fn random_ops_survive_reopen() -> Result<()> {
    let dir = tempdir()?;
    let config = EngineConfig::new(dir.path()).with_max_run_bytes(MODEL_RUN_BYTES);
    let mut model: BTreeMap<u64, Vec<u8>> = BTreeMap::new();
    let mut rng = StdRng::seed_from_u64(2024);

    for _round in 0..4 {
        let mut engine = Engine::open(config.clone())?;
        for _ in 0..800 {
            let key = rng.gen_range(0..KEY_SPACE);
            if rng.gen_bool(0.7) {
                let value = random_value(&mut rng);
                engine.put(key, value.clone())?;
                model.insert(key, value);
            } else {
                assert_eq!(engine.del(key)?, model.remove(&key).is_some());
            }
        }
        // Only flushed data survives, so persist before dropping.
        engine.force_flush()?;
    }

    let engine = Engine::open(config)?;
    assert_level_invariants(&engine);
    for key in 0..KEY_SPACE {
        assert_eq!(engine.get(key)?, model.get(&key).cloned(), "key {}", key);
    }
    Ok(())
}
