use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use engine::{Engine, EngineConfig};
use tempfile::tempdir;

const N_KEYS: u64 = 5_000;
const VALUE_SIZE: usize = 100;
const RUN_BYTES: u64 = 64 * 1024;

fn open(dir: &std::path::Path) -> Engine {
    Engine::open(EngineConfig::new(dir).with_max_run_bytes(RUN_BYTES)).unwrap()
}

fn loaded(dir: &std::path::Path) -> Engine {
    let mut engine = open(dir);
    for k in 0..N_KEYS {
        engine.put(k, vec![b'x'; VALUE_SIZE]).unwrap();
    }
    engine.force_flush().unwrap();
    engine
}

fn put_benchmark(c: &mut Criterion) {
    c.bench_function("engine_put_5k_with_compaction", |b| {
        b.iter_batched(
            || tempdir().unwrap(),
            |dir| {
                let mut engine = open(dir.path());
                for k in 0..N_KEYS {
                    engine.put(k, vec![b'x'; VALUE_SIZE]).unwrap();
                }
            },
            BatchSize::PerIteration,
        );
    });
}

fn get_benchmark(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let engine = loaded(dir.path());
    c.bench_function("engine_get_hit_5k", |b| {
        b.iter(|| {
            for k in (0..N_KEYS).step_by(7) {
                assert!(engine.get(k).unwrap().is_some());
            }
        });
    });
    c.bench_function("engine_get_miss_5k", |b| {
        b.iter(|| {
            for k in (N_KEYS..2 * N_KEYS).step_by(7) {
                assert!(engine.get(k).unwrap().is_none());
            }
        });
    });
}

fn scan_benchmark(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let engine = loaded(dir.path());
    c.bench_function("engine_scan_1k", |b| {
        b.iter(|| {
            let rows = engine.scan(1_000, 1_999).unwrap();
            assert_eq!(rows.len(), 1_000);
        });
    });
}

criterion_group!(benches, put_benchmark, get_benchmark, scan_benchmark);
criterion_main!(benches);
