//! # RDB - Snapshot Store
//!
//! Full-state snapshots of the click ranking, published atomically and
//! retained in bounded number. A snapshot plus the WAL records newer than
//! its timestamp reconstructs the exact pre-crash ranking.
//!
//! ## File Layout
//!
//! ```text
//! {dir}/dump-{snapshotTs}.rdb        published snapshots (unix seconds)
//! {dir}/dump-{nanos}.rdb.tmp        transient during save
//! ```
//!
//! Body (all little-endian):
//!
//! ```text
//! "RDB1" | version: u16 | snapshotTs: i64 | n: u32 | entries[n] | crc32: u32
//! entry:   id: u64 | count: u64 | name_len: u16 | name[name_len]
//! ```
//!
//! The trailing CRC32 covers every byte before it. A snapshot is valid iff
//! the magic matches, the CRC matches, and all entries decode; anything else
//! is corruption and [`Rdb::load_latest`] refuses it; there is no fallback
//! to an older snapshot.
//!
//! ## Atomicity
//!
//! `save` writes to a temp file, fsyncs, and renames; the rename is the
//! publication point. Retention pruning runs after publication, keeping the
//! lexicographically greatest `max_files` names, which, for zero-free
//! unix-second timestamps of equal width, are the most recent ones.

mod reader;
mod writer;

use anyhow::Result;
use codec::FileRecord;
use std::io;
use std::path::{Path, PathBuf};

/// Snapshot file magic.
pub const MAGIC: &[u8; 4] = b"RDB1";

/// Current snapshot body version.
pub const VERSION: u16 = 1;

/// Result of loading the newest snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdbLoad {
    /// Timestamp embedded in the snapshot; `0` when none exists. WAL replay
    /// applies only records strictly newer than this.
    pub snapshot_ts: i64,
    /// The ranking state at snapshot time, in serialized order.
    pub files: Vec<FileRecord>,
    /// Path of the loaded file; `None` when the directory was empty.
    pub path: Option<PathBuf>,
}

/// The snapshot store for one directory.
#[derive(Debug, Clone)]
pub struct Rdb {
    dir: PathBuf,
    max_files: usize,
}

impl Rdb {
    /// Opens (creating if needed) a snapshot store rooted at `dir`,
    /// retaining at most `max_files` snapshots.
    pub fn open<P: AsRef<Path>>(dir: P, max_files: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_files })
    }

    /// Directory holding the snapshot files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Retention bound.
    #[must_use]
    pub fn max_files(&self) -> usize {
        self.max_files
    }
}

/// Lists published snapshots (`dump-*.rdb`, tmp files excluded), sorted
/// lexicographically; oldest first, newest last.
pub(crate) fn list_snapshots(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("dump-") && n.ends_with(".rdb"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}
