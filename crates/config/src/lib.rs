//! # Config - Engine Tunables
//!
//! A plain settings struct shared by the engine and the CLI. Defaults match
//! the production deployment; every knob can be overridden before the engine
//! is constructed (the CLI maps `CLICKRANK_*` environment variables here).

use std::path::PathBuf;
use std::time::Duration;

/// Default number of WAL shards.
pub const DEFAULT_WAL_SHARDS: usize = 4;

/// Default per-shard segment size threshold before rotation (64 MiB).
pub const DEFAULT_WAL_MAX_SIZE: u64 = 64 * 1024 * 1024;

/// Default number of retained snapshot files.
pub const DEFAULT_RDB_MAX_FILES: usize = 3;

/// Default snapshot interval (5 minutes).
pub const DEFAULT_SNAP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default event channel capacity; producers block when it is full.
pub const DEFAULT_EVENT_CAPACITY: usize = 10_000;

/// Runtime configuration for the ranking engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding WAL segment files (`wal-{shard}-{seq}.log`).
    pub wal_dir: PathBuf,
    /// Byte threshold per shard segment before rotation.
    pub wal_max_size: u64,
    /// Number of parallel WAL shards.
    pub wal_shards: usize,
    /// Directory holding snapshot files (`dump-{ts}.rdb`).
    pub rdb_dir: PathBuf,
    /// Snapshot retention count.
    pub rdb_max_files: usize,
    /// Interval between automatic snapshots. Zero disables the ticker.
    pub snap_interval: Duration,
    /// Capacity of the in-memory click event channel.
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wal_dir: PathBuf::from("data/wal"),
            wal_max_size: DEFAULT_WAL_MAX_SIZE,
            wal_shards: DEFAULT_WAL_SHARDS,
            rdb_dir: PathBuf::from("data/rdb"),
            rdb_max_files: DEFAULT_RDB_MAX_FILES,
            snap_interval: DEFAULT_SNAP_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Config {
    /// A configuration rooted at `dir`, with WAL and snapshot directories
    /// side by side. Convenient for tests and single-directory deployments.
    pub fn rooted<P: Into<PathBuf>>(dir: P) -> Self {
        let dir = dir.into();
        Self {
            wal_dir: dir.join("wal"),
            rdb_dir: dir.join("rdb"),
            ..Self::default()
        }
    }
}
