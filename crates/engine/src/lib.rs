//! # Engine - Clickrank Ranking Engine
//!
//! The central orchestrator that ties together the [`wal`], [`rdb`], and
//! [`ranking`] crates into a durable click-count ranking service.
//!
//! ## Architecture
//!
//! ```text
//! Callers (click / top_n / top_all)
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ click.rs → WAL append (fsync) → event channel │
//! │                                   |           │
//! │                                   v           │
//! │                          apply worker         │
//! │                    (sole ranking writer)      │
//! │                                               │
//! │ snapshot.rs → ticker → copy ranking → RDB     │
//! │                        → prune old WAL        │
//! │                                               │
//! │ recovery.rs → load snapshot → replay WAL      │
//! │               → drain barrier                 │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                              |
//! |---------------|------------------------------------------------------|
//! | [`lib.rs`]    | `Engine` struct, constructor, `stop`, `Debug`, `Drop` |
//! | [`click.rs`]  | `click()`, `top_n()`, `top_all()`, `drain()`          |
//! | [`snapshot`]  | ticker task, `snapshot_now()`, WAL segment pruning    |
//! | [`recovery`]  | snapshot load + WAL replay + drain barrier            |
//!
//! ## Crash Safety
//!
//! Every click is appended and fsynced to the WAL **before** it is enqueued
//! for the ranking; a `click` that returns `Ok` is durable even though its
//! ranking effect is asynchronous. Snapshots publish by atomic rename, and
//! only WAL segments strictly older than the latest snapshot are pruned, so
//! snapshot + replay always reconstructs the pre-crash counts.

mod click;
mod recovery;
mod snapshot;

use anyhow::{anyhow, Result};
use config::Config;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::RwLock;
use ranking::Ranking;
use rdb::Rdb;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use wal::Wal;

pub use codec::FileRecord;
pub use ranking::{LookupFn, NameLookup, NoNames};

/// A message on the engine's event channel.
///
/// The apply worker is the only consumer; it processes events strictly in
/// channel order.
pub(crate) enum Event {
    /// One click to apply to the ranking.
    Hit { id: u64 },
    /// A drain barrier: acknowledged once every earlier event is applied.
    Barrier(Sender<()>),
}

/// The durable click-ranking engine.
///
/// # Write Path
///
/// 1. `click(id)` stamps the current unix second, appends to the sharded
///    WAL, and blocks until the record is fsynced.
/// 2. The event is enqueued on a bounded channel (producers block when it
///    is full) and the call returns.
/// 3. The apply worker (the only writer) pops events and mutates the
///    ranking under its write lock.
///
/// # Read Path
///
/// `top_n`/`top_all` copy records out under the ranking's read lock; they
/// observe a consistent snapshot that may trail in-flight clicks.
///
/// # Lifecycle
///
/// [`Engine::new`] spawns the apply worker. [`Engine::recover`] must run
/// before [`Engine::start`] (which launches the snapshot ticker) and before
/// any `click` traffic. [`Engine::stop`] shuts everything down and takes a
/// final snapshot; `Drop` does the same on a best-effort basis.
pub struct Engine {
    pub(crate) ranking: Arc<RwLock<Ranking>>,
    pub(crate) wal: Arc<Wal>,
    pub(crate) rdb: Rdb,
    /// `Some` while the engine accepts events; taken by `stop`.
    pub(crate) events: Option<Sender<Event>>,
    worker: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    /// Dropping this sender tells the ticker to exit.
    shutdown: Option<Sender<()>>,
    pub(crate) snap_interval: Duration,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("ranked_files", &self.ranking.read().len())
            .field("wal_dir", &self.wal.dir())
            .field("wal_shards", &self.wal.shard_count())
            .field("rdb_dir", &self.rdb.dir())
            .field("snap_interval", &self.snap_interval)
            .field("running", &self.events.is_some())
            .field("ticker_active", &self.ticker.is_some())
            .finish()
    }
}

impl Engine {
    /// Builds an engine from `cfg`, resolving first-click names via
    /// `lookup`, and spawns the apply worker.
    ///
    /// The WAL and snapshot directories are created if missing. The engine
    /// starts cold: call [`recover`](Engine::recover) to rebuild state and
    /// [`start`](Engine::start) to begin periodic snapshots.
    pub fn new(cfg: &Config, lookup: Box<dyn NameLookup>) -> Result<Self> {
        let wal = Arc::new(Wal::open(&cfg.wal_dir, cfg.wal_shards, cfg.wal_max_size)?);
        let rdb = Rdb::open(&cfg.rdb_dir, cfg.rdb_max_files)?;
        let ranking = Arc::new(RwLock::new(Ranking::new(lookup)));

        let (events, rx) = bounded(cfg.event_capacity);
        let worker_ranking = Arc::clone(&ranking);
        let worker = std::thread::Builder::new()
            .name("ranking-apply".into())
            .spawn(move || apply_worker(rx, worker_ranking))?;

        Ok(Self {
            ranking,
            wal,
            rdb,
            events: Some(events),
            worker: Some(worker),
            ticker: None,
            shutdown: None,
            snap_interval: cfg.snap_interval,
        })
    }

    /// Number of files currently in the ranking.
    #[must_use]
    pub fn ranked_count(&self) -> usize {
        self.ranking.read().len()
    }

    /// Shuts the engine down.
    ///
    /// Stops the snapshot ticker, closes the event channel and waits for
    /// the apply worker to drain it, closes the WAL, and takes one final
    /// synchronous snapshot (pruning superseded segments). Idempotent:
    /// calling `stop` on a stopped engine is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        if self.events.is_none() {
            return Ok(());
        }

        // Ticker first, so no periodic snapshot races the final one.
        self.shutdown.take();
        if let Some(handle) = self.ticker.take() {
            handle
                .join()
                .map_err(|_| anyhow!("snapshot ticker panicked"))?;
        }

        // Closing the channel lets the worker finish whatever is queued.
        self.events.take();
        if let Some(handle) = self.worker.take() {
            handle.join().map_err(|_| anyhow!("apply worker panicked"))?;
        }

        self.wal.close()?;
        snapshot::snapshot_and_prune(&self.ranking, &self.rdb, self.wal.dir())?;
        Ok(())
    }
}

/// Consumes events until the channel closes. The sole ranking writer.
fn apply_worker(rx: Receiver<Event>, ranking: Arc<RwLock<Ranking>>) {
    for event in rx {
        match event {
            Event::Hit { id } => ranking.write().hit(id),
            Event::Barrier(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

/// Best-effort shutdown on drop.
///
/// Errors are discarded because `Drop` cannot propagate them; acknowledged
/// clicks are already durable in the WAL and will be recovered on the next
/// startup.
impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests;
