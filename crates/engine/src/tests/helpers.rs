use crate::Engine;
use codec::FileRecord;
use config::Config;
use ranking::NoNames;
use std::path::Path;
use std::time::Duration;

/// A small-footprint config rooted at `root`, with the ticker disabled so
/// tests control snapshot timing themselves.
pub fn test_config(root: &Path) -> Config {
    Config {
        wal_dir: root.join("wal"),
        rdb_dir: root.join("rdb"),
        wal_shards: 2,
        wal_max_size: 64 * 1024,
        rdb_max_files: 3,
        snap_interval: Duration::ZERO,
        event_capacity: 64,
    }
}

/// An engine with no name source.
pub fn engine_with(cfg: &Config) -> Engine {
    Engine::new(cfg, Box::new(NoNames)).unwrap()
}

pub fn rec(id: u64, count: u64) -> FileRecord {
    FileRecord {
        id,
        file_name: String::new(),
        count,
    }
}

pub fn counts(engine: &Engine) -> Vec<(u64, u64)> {
    engine.top_all().iter().map(|f| (f.id, f.count)).collect()
}
