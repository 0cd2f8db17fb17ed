//! # CLI - interactive shell for the LSM key-value engine
//!
//! Reads commands from stdin, runs them against the engine and prints the
//! results to stdout. Works interactively or with commands piped in.
//!
//! ## Commands
//!
//! ```text
//! PUT key value      Insert or overwrite a key (value may contain spaces)
//! GET key            Look up a key (prints the value or "(nil)")
//! DEL key            Delete a key (prints "true" if it existed)
//! SCAN start end     Inclusive range scan
//! FLUSH              Write the buffer out as a level-0 run
//! STATS              Print buffer and per-level run counts
//! RESET              Delete every record and run
//! EXIT / QUIT        Leave the shell
//! ```
//!
//! Keys are decimal `u64`. Malformed input prints `ERR ...` and the shell
//! keeps going.
//!
//! ## Configuration
//!
//! ```text
//! LSMKV_DATA_DIR       data directory            (default: "data")
//! LSMKV_MAX_RUN_KB     maximum run size in KiB   (default: 2048)
//! LSMKV_SKIPLIST_SEED  write buffer level seed   (default: 1)
//! RUST_LOG             log filter, logs go to stderr
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! lsmkv started (data_dir=data, max_run=2048KiB, levels=1, runs=0)
//! > PUT 1 hello
//! OK
//! > GET 1
//! hello
//! > SCAN 0 10
//! 1 -> hello
//! (1 entries)
//! > EXIT
//! bye
//! ```

use anyhow::Result;
use config::EngineConfig;
use engine::Engine;
use std::io::{self, BufRead, Write};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let config = EngineConfig::from_env();
    let mut engine = Engine::open(config)?;

    println!(
        "lsmkv started (data_dir={}, max_run={}KiB, levels={}, runs={})",
        engine.config().data_dir.display(),
        engine.config().max_run_bytes / 1024,
        engine.level_count(),
        engine.run_count()
    );
    println!("Commands: PUT key value | GET key | DEL key | SCAN start end");
    println!("          FLUSH | STATS | RESET | EXIT");

    info!(
        data_dir = %engine.config().data_dir.display(),
        levels = engine.level_count(),
        runs = engine.run_count(),
        "shell started"
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    run_shell(&mut engine, stdin.lock(), stdout.lock())?;

    info!(
        buffered = engine.buffer_len(),
        runs = engine.run_count(),
        "shell exiting, buffered writes are discarded"
    );
    Ok(())
}

/// Runs commands from `input` until EOF or `EXIT`, writing replies to `out`.
fn run_shell<R: BufRead, W: Write>(engine: &mut Engine, input: R, mut out: W) -> Result<()> {
    write!(out, "> ")?;
    out.flush()?;

    for line in input.lines() {
        let line = line?;
        if !execute(engine, &line, &mut out)? {
            break;
        }
        write!(out, "> ")?;
        out.flush()?;
    }
    Ok(())
}

/// Executes one command line. Returns `false` once the shell should stop.
fn execute<W: Write>(engine: &mut Engine, line: &str, out: &mut W) -> Result<bool> {
    let mut parts = line.split_whitespace();
    let cmd = match parts.next() {
        Some(cmd) => cmd,
        None => return Ok(true),
    };

    match cmd.to_uppercase().as_str() {
        "PUT" => {
            let key = parts.next().map(parse_key);
            let value = parts.collect::<Vec<&str>>().join(" ");
            match key {
                Some(Ok(key)) if !value.is_empty() => match engine.put(key, value) {
                    Ok(()) => writeln!(out, "OK")?,
                    Err(e) => writeln!(out, "ERR put failed: {}", e)?,
                },
                Some(Err(e)) => writeln!(out, "ERR {}", e)?,
                _ => writeln!(out, "ERR usage: PUT key value")?,
            }
        }
        "GET" => match parts.next().map(parse_key) {
            Some(Ok(key)) => match engine.get(key) {
                Ok(Some(v)) => writeln!(out, "{}", String::from_utf8_lossy(&v))?,
                Ok(None) => writeln!(out, "(nil)")?,
                Err(e) => writeln!(out, "ERR read failed: {}", e)?,
            },
            Some(Err(e)) => writeln!(out, "ERR {}", e)?,
            None => writeln!(out, "ERR usage: GET key")?,
        },
        "DEL" => match parts.next().map(parse_key) {
            Some(Ok(key)) => match engine.del(key) {
                Ok(found) => writeln!(out, "{}", found)?,
                Err(e) => writeln!(out, "ERR del failed: {}", e)?,
            },
            Some(Err(e)) => writeln!(out, "ERR {}", e)?,
            None => writeln!(out, "ERR usage: DEL key")?,
        },
        "SCAN" => {
            let bounds = (parts.next().map(parse_key), parts.next().map(parse_key));
            match bounds {
                (Some(Ok(start)), Some(Ok(end))) => match engine.scan(start, end) {
                    Ok(results) if results.is_empty() => writeln!(out, "(empty)")?,
                    Ok(results) => {
                        for (k, v) in &results {
                            writeln!(out, "{} -> {}", k, String::from_utf8_lossy(v))?;
                        }
                        writeln!(out, "({} entries)", results.len())?;
                    }
                    Err(e) => writeln!(out, "ERR scan failed: {}", e)?,
                },
                (Some(Err(e)), _) | (_, Some(Err(e))) => writeln!(out, "ERR {}", e)?,
                _ => writeln!(out, "ERR usage: SCAN start end")?,
            }
        }
        "FLUSH" => match engine.force_flush() {
            Ok(()) => writeln!(
                out,
                "OK (levels={}, runs={})",
                engine.level_count(),
                engine.run_count()
            )?,
            Err(e) => writeln!(out, "ERR flush failed: {}", e)?,
        },
        "STATS" => {
            writeln!(
                out,
                "buffer: {} entries, {} bytes; next_ts={}",
                engine.buffer_len(),
                engine.buffer_size(),
                engine.next_timestamp()
            )?;
            for (index, level) in engine.levels().iter().enumerate() {
                writeln!(
                    out,
                    "L{}: {}/{} runs, {} pairs",
                    index,
                    level.runs.len(),
                    Engine::level_capacity(index),
                    level.runs.iter().map(|r| r.pairs).sum::<u64>()
                )?;
            }
        }
        "RESET" => match engine.reset() {
            Ok(()) => writeln!(out, "OK")?,
            Err(e) => writeln!(out, "ERR reset failed: {}", e)?,
        },
        "EXIT" | "QUIT" => {
            writeln!(out, "bye")?;
            return Ok(false);
        }
        other => writeln!(out, "ERR unknown command: {}", other)?,
    }
    Ok(true)
}

fn parse_key(raw: &str) -> std::result::Result<u64, String> {
    raw.parse()
        .map_err(|_| format!("invalid key {:?}: expected an unsigned integer", raw))
}
