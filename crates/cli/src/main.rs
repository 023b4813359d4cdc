//! # CLI - Clickrank Interactive Shell
//!
//! A REPL-style command-line interface for the clickrank engine. Reads
//! commands from stdin, executes them against the engine, and prints
//! results to stdout. Designed for both interactive use and scripted
//! testing (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! CLICK id          Record one click for a file id
//! TOP n             Print the n most-clicked files
//! ALL               Print the full ranking
//! ADD name [path]   Register a file, print its new id
//! FILES             List registered files
//! FORGET id         Drop a file's metadata (its clicks remain ranked)
//! SNAPSHOT          Force a snapshot + WAL prune right now
//! STATS             Print engine debug info
//! EXIT / QUIT       Shut down gracefully (final snapshot)
//! ```
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! CLICKRANK_WAL_DIR     WAL segment directory        (default: "data/wal")
//! CLICKRANK_WAL_MAX_MB  Segment rotation size, MiB   (default: 64)
//! CLICKRANK_WAL_SHARDS  Parallel WAL shards          (default: 4)
//! CLICKRANK_RDB_DIR     Snapshot directory           (default: "data/rdb")
//! CLICKRANK_RDB_KEEP    Snapshots retained           (default: 3)
//! CLICKRANK_SNAP_SECS   Snapshot interval, seconds   (default: 300, 0 = off)
//! CLICKRANK_EVENT_CAP   Event channel capacity       (default: 10000)
//! CLICKRANK_FILES_JSON  File-metadata keystore path  (default: "data/files.json")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! clickrank started (wal=data/wal, shards=4, rdb=data/rdb, snap=300s, files=0)
//! > ADD report.pdf
//! 1
//! > CLICK 1
//! OK
//! > ALL
//! 1  report.pdf  1
//! (1 files)
//! > EXIT
//! bye
//! ```
mod store;

use anyhow::Result;
use config::Config;
use engine::{Engine, FileRecord, LookupFn};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use store::FileStore;

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Builds the engine [`Config`] from `CLICKRANK_*` environment variables.
fn config_from_env() -> Config {
    let defaults = Config::default();
    let wal_max_mb: u64 = env_or("CLICKRANK_WAL_MAX_MB", "64").parse().unwrap_or(64);
    Config {
        wal_dir: PathBuf::from(env_or("CLICKRANK_WAL_DIR", "data/wal")),
        wal_max_size: wal_max_mb * 1024 * 1024,
        wal_shards: env_or("CLICKRANK_WAL_SHARDS", "4")
            .parse()
            .unwrap_or(defaults.wal_shards),
        rdb_dir: PathBuf::from(env_or("CLICKRANK_RDB_DIR", "data/rdb")),
        rdb_max_files: env_or("CLICKRANK_RDB_KEEP", "3")
            .parse()
            .unwrap_or(defaults.rdb_max_files),
        snap_interval: Duration::from_secs(env_or("CLICKRANK_SNAP_SECS", "300").parse().unwrap_or(300)),
        event_capacity: env_or("CLICKRANK_EVENT_CAP", "10000")
            .parse()
            .unwrap_or(defaults.event_capacity),
    }
}

fn print_ranking(files: &[FileRecord]) {
    if files.is_empty() {
        println!("(empty)");
        return;
    }
    for f in files {
        println!("{}  {}  {}", f.id, f.file_name, f.count);
    }
    println!("({} files)", files.len());
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = config_from_env();
    let files_json = env_or("CLICKRANK_FILES_JSON", "data/files.json");

    let store = Arc::new(Mutex::new(FileStore::load(&files_json)?));

    // The engine resolves names through the keystore on first click.
    let lookup = {
        let store = Arc::clone(&store);
        LookupFn(move |id: u64| -> Option<String> {
            store
                .lock()
                .ok()
                .and_then(|s| s.get(id).map(|f| f.name.clone()))
        })
    };

    let mut engine = Engine::new(&cfg, Box::new(lookup))?;
    engine.recover()?;
    engine.start()?;

    println!(
        "clickrank started (wal={}, shards={}, rdb={}, snap={}s, files={})",
        cfg.wal_dir.display(),
        cfg.wal_shards,
        cfg.rdb_dir.display(),
        cfg.snap_interval.as_secs(),
        store.lock().map(|s| s.len()).unwrap_or(0),
    );
    println!("Commands: CLICK id | TOP n | ALL | ADD name [path] | FILES");
    println!("          FORGET id | SNAPSHOT | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "CLICK" => match parts.next().and_then(|s| s.parse::<u64>().ok()) {
                    Some(id) if id >= 1 => match engine.click(id) {
                        Ok(()) => println!("OK"),
                        Err(e) => println!("ERR click failed: {}", e),
                    },
                    _ => println!("ERR usage: CLICK id (id >= 1)"),
                },
                "TOP" => match parts.next().and_then(|s| s.parse::<usize>().ok()) {
                    Some(n) if n >= 1 => {
                        // Drain first so the shell reads its own clicks.
                        let _ = engine.drain();
                        print_ranking(&engine.top_n(n));
                    }
                    _ => println!("ERR usage: TOP n (n >= 1)"),
                },
                "ALL" => {
                    let _ = engine.drain();
                    print_ranking(&engine.top_all());
                }
                "ADD" => {
                    if let Some(name) = parts.next() {
                        let path = parts.next().unwrap_or("").to_string();
                        match store.lock() {
                            Ok(mut s) => match s.add(name, &path) {
                                Ok(id) => println!("{}", id),
                                Err(e) => println!("ERR add failed: {}", e),
                            },
                            Err(_) => println!("ERR file store unavailable"),
                        }
                    } else {
                        println!("ERR usage: ADD name [path]");
                    }
                }
                "FILES" => match store.lock() {
                    Ok(s) => {
                        for (id, info) in s.iter() {
                            println!("{}  {}  {}", id, info.name, info.path);
                        }
                        println!("({} files)", s.len());
                    }
                    Err(_) => println!("ERR file store unavailable"),
                },
                "FORGET" => match parts.next().and_then(|s| s.parse::<u64>().ok()) {
                    Some(id) => match store.lock() {
                        Ok(mut s) => match s.remove(id) {
                            Ok(true) => println!("OK"),
                            Ok(false) => println!("(not found)"),
                            Err(e) => println!("ERR forget failed: {}", e),
                        },
                        Err(_) => println!("ERR file store unavailable"),
                    },
                    None => println!("ERR usage: FORGET id"),
                },
                "SNAPSHOT" => match engine.snapshot_now() {
                    Ok((ts, path)) => println!("OK snapshot {} at {}", ts, path.display()),
                    Err(e) => println!("ERR snapshot failed: {}", e),
                },
                "STATS" => {
                    println!("{:?}", engine);
                }
                "EXIT" | "QUIT" => {
                    break;
                }
                other => {
                    println!("unknown command: {}", other);
                }
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    engine.stop()?;
    println!("bye");

    Ok(())
}
