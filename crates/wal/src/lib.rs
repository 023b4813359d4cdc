//! # WAL - Sharded Write-Ahead Log
//!
//! Crash-safe durability for click events. Every accepted click is framed
//! (see [`codec`]) and appended to one of N parallel shard files **before**
//! the in-memory ranking learns about it; on restart the segments are
//! replayed to rebuild everything the latest snapshot does not cover.
//!
//! ## On-Disk Layout
//!
//! ```text
//! {dir}/wal-{shard}-{seq:06}.log
//! ```
//!
//! Each shard is an independent append-only stream with its own mutex and
//! buffered writer. A segment rotates when the next frame would push it past
//! the size threshold. Appends are dispatched round-robin by an atomic
//! counter, so no ordering holds across shards, only within one.
//!
//! ## Durability & Replay
//!
//! [`Wal::append`] returns only after the frame is flushed and fsynced.
//! [`Wal::replay_all`] walks every segment (one worker per shard, segments
//! in sequence order) and delivers records newer than the caller's cutoff.
//! A torn or corrupt tail ends that one file silently: a crash mid-append
//! is expected, and the frame CRC guarantees a damaged record is never
//! delivered as data.

use codec::{CodecError, FrameReader, CLICK_FRAME_LEN};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A segment produced a frame that failed validation where corruption
    /// is not tolerated (never surfaced by replay, which stops silently).
    #[error("corrupt segment")]
    Corrupt,
}

impl From<CodecError> for WalError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Io(io) => WalError::Io(io),
            CodecError::Corrupt => WalError::Corrupt,
        }
    }
}

/// Formats the segment filename for `(shard, seq)`.
fn segment_name(shard: usize, seq: u64) -> String {
    format!("wal-{}-{:06}.log", shard, seq)
}

/// Parses `wal-{shard}-{seq}.log` back into `(shard, seq)`.
///
/// Returns `None` for anything that is not a segment file.
pub fn parse_segment_name(name: &str) -> Option<(usize, u64)> {
    let rest = name.strip_prefix("wal-")?.strip_suffix(".log")?;
    let (shard, seq) = rest.split_once('-')?;
    Some((shard.parse().ok()?, seq.parse().ok()?))
}

/// Lists all segment files in `dir`, sorted lexicographically by filename.
///
/// Used by replay and by the snapshot pruner. A missing directory yields an
/// empty list (nothing was ever appended).
pub fn list_segments(dir: &Path) -> io::Result<Vec<PathBuf>> {
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
                .and_then(parse_segment_name)
                .is_some()
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// One shard's mutable state: the current segment writer and its counters.
///
/// Lifecycle: fresh shards have no writer and create their first segment on
/// first append; rotation closes the current segment and opens `seq + 1`
/// truncated.
struct Shard {
    id: usize,
    seq: u64,
    size: u64,
    writer: Option<BufWriter<File>>,
}

impl Shard {
    /// Opens the segment for the shard's current `seq`.
    ///
    /// `truncate` is set on rotation (the new segment must start empty);
    /// startup resume opens in append mode and adopts the existing size.
    fn open_current(&mut self, dir: &Path, truncate: bool) -> Result<(), WalError> {
        let path = dir.join(segment_name(self.id, self.seq));
        let file = if truncate {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)?
        } else {
            OpenOptions::new().create(true).append(true).open(&path)?
        };
        self.size = file.metadata()?.len();
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    /// Appends one framed payload, rotating first if the segment would
    /// exceed `max_size`. Flushes and fsyncs before returning.
    fn append(&mut self, dir: &Path, max_size: u64, payload: &[u8]) -> Result<(), WalError> {
        let frame_len = 8 + payload.len() as u64;
        match &self.writer {
            None => self.open_current(dir, false)?,
            Some(_) if self.size + frame_len > max_size => self.rotate(dir)?,
            Some(_) => {}
        }

        let Some(w) = self.writer.as_mut() else {
            return Err(WalError::Io(io::Error::new(
                io::ErrorKind::Other,
                "shard writer unavailable",
            )));
        };
        codec::write_frame(w, payload)?;
        w.flush()?;
        w.get_ref().sync_all()?;
        self.size += frame_len;
        Ok(())
    }

    /// Closes the current segment and opens the next one truncated.
    fn rotate(&mut self, dir: &Path) -> Result<(), WalError> {
        self.sync_and_close()?;
        self.seq += 1;
        self.open_current(dir, true)
    }

    /// Flushes, fsyncs, and drops the writer. Idempotent.
    fn sync_and_close(&mut self) -> Result<(), WalError> {
        if let Some(mut w) = self.writer.take() {
            w.flush()?;
            w.get_ref().sync_all()?;
        }
        Ok(())
    }
}

/// The sharded write-ahead log.
///
/// `append` is callable from any thread: an atomic round-robin counter
/// picks a shard and that shard's mutex serializes the file write. Shards
/// never share locks.
pub struct Wal {
    dir: PathBuf,
    max_size: u64,
    shards: Vec<Mutex<Shard>>,
    next: AtomicUsize,
}

impl Wal {
    /// Opens a WAL over `dir` with `shards` parallel streams.
    ///
    /// Each shard scans for its existing segments and resumes appending to
    /// the highest sequence number; a shard with none creates its first
    /// segment lazily on first append.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created or scanned, if an existing
    /// segment cannot be reopened, or if `shards` is zero.
    pub fn open<P: AsRef<Path>>(dir: P, shards: usize, max_size: u64) -> Result<Self, WalError> {
        if shards == 0 {
            return Err(WalError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "shard count must be at least 1",
            )));
        }

        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        // Highest existing seq per shard id, from one directory scan.
        let mut highest: BTreeMap<usize, u64> = BTreeMap::new();
        for path in list_segments(&dir)? {
            if let Some((shard, seq)) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_segment_name)
            {
                let entry = highest.entry(shard).or_insert(seq);
                *entry = (*entry).max(seq);
            }
        }

        let mut shard_states = Vec::with_capacity(shards);
        for id in 0..shards {
            let mut shard = Shard {
                id,
                seq: highest.get(&id).copied().unwrap_or(0),
                size: 0,
                writer: None,
            };
            if highest.contains_key(&id) {
                shard.open_current(&dir, false)?;
            }
            shard_states.push(Mutex::new(shard));
        }

        Ok(Self {
            dir,
            max_size,
            shards: shard_states,
            next: AtomicUsize::new(0),
        })
    }

    /// Directory holding this WAL's segment files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of shards.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Durably appends one click record.
    ///
    /// Picks a shard round-robin, frames the 16-byte payload, writes it,
    /// flushes, and fsyncs. When this returns `Ok`, the record survives a
    /// crash. On error the frame is either fully durable or absent; a torn
    /// tail is discarded by the next replay.
    pub fn append(&self, file_id: u64, ts: i64) -> Result<(), WalError> {
        let payload = codec::encode_click(file_id, ts);
        let n = self.next.fetch_add(1, Ordering::Relaxed) % self.shards.len();
        let mut shard = self.shards[n].lock();
        shard.append(&self.dir, self.max_size, &payload)
    }

    /// Replays every segment, delivering `apply(file_id, ts)` for each
    /// record with `ts > min_ts`.
    ///
    /// Segments are grouped by shard and replayed in parallel, one worker
    /// per shard, each walking its segments in sequence order. Within a
    /// shard records arrive in append order, while across shards there is
    /// no defined order (click counts commute, which is why the 1-second
    /// timestamp sieve is enough).
    ///
    /// # Termination
    ///
    /// Clean EOF, a truncated tail, a CRC mismatch, or an unexpected payload
    /// size all end that one file silently and replay moves on. I/O errors
    /// (open or read) are fatal.
    pub fn replay_all<F>(&self, min_ts: i64, apply: F) -> Result<(), WalError>
    where
        F: Fn(u64, i64) + Send + Sync,
    {
        // Group by the shard id embedded in the filename, not by the
        // configured shard count: segments written under a larger shard
        // count must still replay.
        let mut groups: BTreeMap<usize, Vec<PathBuf>> = BTreeMap::new();
        for path in list_segments(&self.dir)? {
            if let Some((shard, _)) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_segment_name)
            {
                groups.entry(shard).or_default().push(path);
            }
        }

        let apply = &apply;
        std::thread::scope(|s| {
            let handles: Vec<_> = groups
                .values()
                .map(|files| s.spawn(move || replay_segments(files, min_ts, apply)))
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(result) => result?,
                    Err(_) => {
                        return Err(WalError::Io(io::Error::new(
                            io::ErrorKind::Other,
                            "replay worker panicked",
                        )))
                    }
                }
            }
            Ok(())
        })
    }

    /// Flushes, fsyncs, and closes every shard's current segment.
    pub fn close(&self) -> Result<(), WalError> {
        for shard in &self.shards {
            shard.lock().sync_and_close()?;
        }
        Ok(())
    }
}

/// Replays one shard's segment files in order.
fn replay_segments<F>(files: &[PathBuf], min_ts: i64, apply: &F) -> Result<(), WalError>
where
    F: Fn(u64, i64),
{
    let mut payload = Vec::with_capacity(CLICK_FRAME_LEN as usize);
    for path in files {
        let file = File::open(path)?;
        let mut reader = FrameReader::new(file);
        loop {
            match reader.next(&mut payload) {
                Ok(Some(_)) => match codec::decode_click(&payload) {
                    Ok((file_id, ts)) => {
                        if ts > min_ts {
                            apply(file_id, ts);
                        }
                    }
                    // Unexpected payload size: corruption, stop this file.
                    Err(_) => break,
                },
                Ok(None) => break,
                Err(CodecError::Corrupt) => break,
                Err(CodecError::Io(e)) => return Err(WalError::Io(e)),
            }
        }
    }
    Ok(())
}
