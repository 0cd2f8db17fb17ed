use super::helpers::{assert_files_match_levels, assert_level_invariants, open_small, s_value};
use crate::*;
use anyhow::Result;
use memtable::Value;
use sstable::SSTableWriter;
use std::fs;
use tempfile::tempdir;

// --------------------- Reopen ---------------------

#[test]
fn reopen_restores_flushed_data() -> Result<()> {
    let dir = tempdir()?;
    {
        let mut engine = Engine::new(dir.path())?;
        engine.put(1, "one")?;
        engine.put(2, "two")?;
        engine.force_flush()?;
        assert!(engine.del(2)?);
        engine.force_flush()?;
    }

    let engine = Engine::new(dir.path())?;
    assert_eq!(engine.get(1)?, Some(b"one".to_vec()));
    assert!(engine.get(2)?.is_none());
    assert_eq!(engine.next_timestamp(), 3);
    let stamps: Vec<u64> = engine.levels()[0].runs.iter().map(|r| r.timestamp).collect();
    assert_eq!(stamps, vec![1, 2]);
    Ok(())
}

#[test]
fn reopen_restores_level_structure() -> Result<()> {
    let dir = tempdir()?;
    let (before, next_ts) = {
        let mut engine = open_small(dir.path())?;
        for k in 0..1_500u64 {
            engine.put(k, s_value(48))?;
        }
        engine.force_flush()?;
        assert!(engine.level_count() >= 3);
        (engine.levels(), engine.next_timestamp())
    };

    let mut engine = open_small(dir.path())?;
    assert_eq!(engine.levels(), before);
    assert_eq!(engine.next_timestamp(), next_ts);
    assert_level_invariants(&engine);
    assert_files_match_levels(&engine);
    for k in (0..1_500u64).step_by(13) {
        assert_eq!(engine.get(k)?, Some(s_value(48)));
    }

    // Writing after a reopen continues the timestamp sequence.
    engine.put(99_999, "late")?;
    engine.force_flush()?;
    assert_eq!(engine.next_timestamp(), next_ts + 1);
    Ok(())
}

#[test]
fn unflushed_buffer_is_lost() -> Result<()> {
    let dir = tempdir()?;
    {
        let mut engine = Engine::new(dir.path())?;
        engine.put(1, "flushed")?;
        engine.force_flush()?;
        engine.put(2, "buffered")?;
    }

    let engine = Engine::new(dir.path())?;
    assert_eq!(engine.get(1)?, Some(b"flushed".to_vec()));
    assert!(engine.get(2)?.is_none());
    assert_eq!(engine.buffer_len(), 0);
    Ok(())
}

#[test]
fn fresh_directory_starts_empty() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path().join("nested").join("data");
    let engine = Engine::new(&root)?;
    assert!(root.is_dir());
    assert_eq!(engine.level_count(), 1);
    assert_eq!(engine.run_count(), 0);
    assert_eq!(engine.next_timestamp(), 1);
    Ok(())
}

#[test]
fn level_over_capacity_is_compacted_on_open() -> Result<()> {
    let dir = tempdir()?;
    let config = EngineConfig::new(dir.path());
    let level0 = config.level_dir(0);
    let live = |v: &str| Value::Live(v.as_bytes().to_vec());
    SSTableWriter::write(&level0, 1, &[(1, live("a")), (2, live("a"))])?;
    SSTableWriter::write(&level0, 2, &[(2, live("b"))])?;
    SSTableWriter::write(&level0, 3, &[(3, live("c"))])?;

    let engine = Engine::open(config)?;
    let levels = engine.levels();
    assert!(levels[0].runs.is_empty());
    assert_eq!(
        levels[1].runs,
        vec![RunSummary {
            timestamp: 3,
            min_key: 1,
            max_key: 3,
            pairs: 3
        }]
    );
    assert_eq!(engine.next_timestamp(), 4);
    assert_files_match_levels(&engine);
    assert_eq!(engine.get(1)?, Some(b"a".to_vec()));
    assert_eq!(engine.get(2)?, Some(b"b".to_vec()));
    assert_eq!(engine.get(3)?, Some(b"c".to_vec()));
    Ok(())
}

#[test]
fn already_compacted_level0_runs_are_dropped() -> Result<()> {
    let dir = tempdir()?;
    let config = EngineConfig::new(dir.path());
    let live = |v: &str| Value::Live(v.as_bytes().to_vec());
    // ts 1 was merged into the level-1 run stamped 3 but never deleted.
    let leftover = SSTableWriter::write(&config.level_dir(0), 1, &[(1, live("stale"))])?;
    SSTableWriter::write(&config.level_dir(0), 4, &[(2, live("fresh"))])?;
    SSTableWriter::write(&config.level_dir(1), 3, &[(1, live("merged")), (2, live("old"))])?;

    let engine = Engine::open(config)?;
    assert!(!leftover.path().exists());
    let stamps: Vec<u64> = engine.levels()[0].runs.iter().map(|r| r.timestamp).collect();
    assert_eq!(stamps, vec![4]);
    assert_eq!(engine.get(1)?, Some(b"merged".to_vec()));
    assert_eq!(engine.get(2)?, Some(b"fresh".to_vec()));
    assert_files_match_levels(&engine);
    Ok(())
}

// --------------------- Stray files ---------------------

#[test]
fn temp_runs_are_removed_on_open() -> Result<()> {
    let dir = tempdir()?;
    {
        let mut engine = Engine::new(dir.path())?;
        engine.put(1, "v")?;
        engine.force_flush()?;
    }
    let level0 = EngineConfig::new(dir.path()).level_dir(0);
    let stray = level0.join("7 0-5 6.sst.tmp");
    fs::write(&stray, b"half written")?;

    let engine = Engine::new(dir.path())?;
    assert!(!stray.exists());
    assert_eq!(engine.run_count(), 1);
    assert_eq!(engine.next_timestamp(), 2);
    Ok(())
}

#[test]
fn foreign_files_are_ignored() -> Result<()> {
    let dir = tempdir()?;
    {
        let mut engine = Engine::new(dir.path())?;
        engine.put(1, "v")?;
        engine.force_flush()?;
    }
    let level0 = EngineConfig::new(dir.path()).level_dir(0);
    fs::write(level0.join("notes.txt"), b"hello")?;
    fs::write(level0.join("1 2 3.sst"), b"bad name")?;

    let engine = Engine::new(dir.path())?;
    assert_eq!(engine.run_count(), 1);
    assert_eq!(engine.get(1)?, Some(b"v".to_vec()));
    Ok(())
}

#[test]
fn levels_stop_at_first_missing_directory() -> Result<()> {
    let dir = tempdir()?;
    let config = EngineConfig::new(dir.path());
    fs::create_dir_all(config.level_dir(0))?;
    // level-1 is missing, so level-2 is never looked at.
    let orphan = config.level_dir(2);
    SSTableWriter::write(&orphan, 4, &[(1, Value::Live(b"x".to_vec()))])?;

    let engine = Engine::open(config)?;
    assert_eq!(engine.level_count(), 1);
    assert!(engine.get(1)?.is_none());
    Ok(())
}

// --------------------- Corruption ---------------------

#[test]
fn overlapping_deep_runs_are_rejected() -> Result<()> {
    let dir = tempdir()?;
    let config = EngineConfig::new(dir.path());
    fs::create_dir_all(config.level_dir(0))?;
    let level1 = config.level_dir(1);
    let live = |k: u64| (k, Value::Live(b"v".to_vec()));
    SSTableWriter::write(&level1, 1, &[live(0), live(10)])?;
    SSTableWriter::write(&level1, 2, &[live(5), live(20)])?;

    match Engine::open(config) {
        Err(Error::Invariant { level, .. }) => assert_eq!(level, 1),
        other => panic!("expected Invariant, got {:?}", other),
    }
    Ok(())
}

#[test]
fn truncated_run_fails_to_open() -> Result<()> {
    let dir = tempdir()?;
    let path = {
        let mut engine = Engine::new(dir.path())?;
        engine.put(1, "v")?;
        engine.force_flush()?;
        EngineConfig::new(dir.path()).level_dir(0).join("1 1-1 1.sst")
    };
    fs::write(&path, b"short")?;

    assert!(matches!(Engine::new(dir.path()), Err(Error::Run(_))));
    Ok(())
}
