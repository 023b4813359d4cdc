/// Periodic snapshots and WAL pruning.
///
/// A single ticker thread wakes every `snap_interval`, copies the ranking
/// under its read lock, publishes an RDB snapshot, and deletes WAL segments
/// whose mtime is strictly older than the snapshot timestamp. Failures are
/// logged and the ticker keeps going; `stop` takes one final snapshot
/// synchronously.
use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, select, tick};
use parking_lot::RwLock;
use ranking::Ranking;
use rdb::Rdb;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

use crate::Engine;

impl Engine {
    /// Launches the snapshot ticker.
    ///
    /// No-op when already started or when `snap_interval` is zero
    /// (snapshots then only happen via [`snapshot_now`](Engine::snapshot_now)
    /// and [`stop`](Engine::stop)).
    pub fn start(&mut self) -> Result<()> {
        if self.ticker.is_some() || self.snap_interval.is_zero() {
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let ranking = std::sync::Arc::clone(&self.ranking);
        let rdb = self.rdb.clone();
        let wal_dir = self.wal.dir().to_path_buf();
        let interval = self.snap_interval;

        let handle = std::thread::Builder::new()
            .name("snapshot-ticker".into())
            .spawn(move || {
                let ticks = tick(interval);
                loop {
                    select! {
                        recv(shutdown_rx) -> _ => break,
                        recv(ticks) -> _ => {
                            match snapshot_and_prune(&ranking, &rdb, &wal_dir) {
                                Ok((ts, _)) => debug!(snapshot_ts = ts, "snapshot published"),
                                Err(e) => warn!("snapshot failed: {:#}", e),
                            }
                        }
                    }
                }
            })?;

        self.shutdown = Some(shutdown_tx);
        self.ticker = Some(handle);
        Ok(())
    }

    /// Takes a snapshot right now and prunes superseded WAL segments.
    ///
    /// The copy is point-in-time consistent (taken under the ranking's read
    /// lock); clicks still in the event channel are not part of it and stay
    /// covered by the WAL.
    pub fn snapshot_now(&self) -> Result<(i64, PathBuf)> {
        snapshot_and_prune(&self.ranking, &self.rdb, self.wal.dir())
    }
}

/// Copies the ranking, saves it as a snapshot, and prunes WAL segments the
/// snapshot supersedes. Returns the snapshot timestamp and path.
pub(crate) fn snapshot_and_prune(
    ranking: &RwLock<Ranking>,
    rdb: &Rdb,
    wal_dir: &Path,
) -> Result<(i64, PathBuf)> {
    let copy = ranking.read().top_all();
    let (snapshot_ts, path) = rdb.save(&copy)?;
    prune_stale_segments(wal_dir, snapshot_ts)
        .map_err(|e| anyhow!("segment pruning after snapshot {snapshot_ts} failed: {e}"))?;
    Ok((snapshot_ts, path))
}

/// Deletes WAL segments whose mtime is strictly less than `snapshot_ts`.
///
/// The filter is deliberately conservative: a segment written in the same
/// second as the snapshot stays, and its records are screened out during
/// replay by the `ts > snapshot_ts` sieve instead. Returns how many files
/// were removed.
pub(crate) fn prune_stale_segments(wal_dir: &Path, snapshot_ts: i64) -> std::io::Result<usize> {
    let mut removed = 0;
    for path in wal::list_segments(wal_dir)? {
        let Ok(meta) = std::fs::metadata(&path) else {
            continue;
        };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let mtime = match modified.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(_) => continue,
        };
        if mtime < snapshot_ts && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}
