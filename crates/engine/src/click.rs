/// Click ingestion and ranking queries.
///
/// `click` is the hot path: WAL append (durable before return), then a
/// bounded-channel enqueue toward the apply worker. Queries copy out under
/// the ranking's read lock and may trail clicks still in the channel; the
/// `drain` barrier closes that gap when a caller needs it closed.
use anyhow::{anyhow, bail, Result};
use codec::FileRecord;
use crossbeam_channel::bounded;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Engine, Event};

impl Engine {
    /// Records one click for `file_id`.
    ///
    /// The record is stamped with the current unix second, appended to the
    /// WAL, and fsynced; only then is the event enqueued for the ranking.
    /// On WAL failure the caller sees the error and nothing is enqueued:
    /// a failed click leaves no trace, durable or in-memory.
    ///
    /// Blocks while the event channel is full (backpressure, not an error).
    pub fn click(&self, file_id: u64) -> Result<()> {
        let Some(events) = &self.events else {
            bail!("engine is stopped");
        };

        let ts = unix_seconds()?;
        self.wal.append(file_id, ts)?;
        events
            .send(Event::Hit { id: file_id })
            .map_err(|_| anyhow!("event channel closed"))?;
        Ok(())
    }

    /// Returns up to `n` leading files, best first.
    #[must_use]
    pub fn top_n(&self, n: usize) -> Vec<FileRecord> {
        self.ranking.read().top_n(n)
    }

    /// Returns the full ranking, best first.
    #[must_use]
    pub fn top_all(&self) -> Vec<FileRecord> {
        self.ranking.read().top_all()
    }

    /// Blocks until every event enqueued so far has been applied.
    ///
    /// Implemented as a barrier round-trip through the event channel: the
    /// worker acknowledges it only after processing everything ahead of it.
    /// Recovery uses this to guarantee replayed clicks are visible before
    /// it returns; tests and shutdown paths use it the same way. A stopped
    /// engine is already drained.
    pub fn drain(&self) -> Result<()> {
        let Some(events) = &self.events else {
            return Ok(());
        };
        let (ack_tx, ack_rx) = bounded(1);
        events
            .send(Event::Barrier(ack_tx))
            .map_err(|_| anyhow!("event channel closed"))?;
        ack_rx
            .recv()
            .map_err(|_| anyhow!("apply worker exited before acknowledging"))?;
        Ok(())
    }
}

/// Current wall-clock time as unix seconds.
pub(crate) fn unix_seconds() -> Result<i64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64)
}
