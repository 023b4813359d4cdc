/// Cold-start recovery: latest snapshot + post-snapshot WAL replay.
///
/// Replayed clicks flow through the same event channel live clicks use, so
/// the apply worker remains the only ranking writer even during recovery.
/// A drain barrier at the end guarantees the rebuilt state is fully visible
/// before the engine accepts traffic.
use anyhow::{bail, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use crate::{Engine, Event};

impl Engine {
    /// Rebuilds the ranking from disk.
    ///
    /// 1. Load the newest snapshot (an empty directory is a fresh start
    ///    with `snapshot_ts = 0`) and seed the ranking with its records.
    /// 2. Replay all WAL records with `ts > snapshot_ts`, enqueueing each
    ///    onto the event channel.
    /// 3. Drain: return only after the worker has applied every replayed
    ///    event.
    ///
    /// Call before [`start`](Engine::start) and before any click traffic.
    ///
    /// # Errors
    ///
    /// A corrupted snapshot aborts recovery; there is no fallback to an
    /// older one. WAL replay I/O errors abort too; torn segment tails do
    /// not (they end that one file's replay silently).
    pub fn recover(&self) -> Result<()> {
        let load = self.rdb.load_latest()?;
        let seeded = load.files.len();
        {
            let mut ranking = self.ranking.write();
            for file in load.files {
                ranking.insert(file);
            }
        }

        let Some(events) = &self.events else {
            bail!("engine is stopped");
        };
        let tx = events.clone();
        let replayed = AtomicU64::new(0);
        self.wal.replay_all(load.snapshot_ts, |id, _ts| {
            // The engine holds its own sender, so the channel cannot close
            // mid-replay; a full channel just blocks the replay worker.
            let _ = tx.send(Event::Hit { id });
            replayed.fetch_add(1, Ordering::Relaxed);
        })?;

        self.drain()?;
        info!(
            snapshot_ts = load.snapshot_ts,
            seeded,
            replayed = replayed.load(Ordering::Relaxed),
            "recovery complete"
        );
        Ok(())
    }
}
