use anyhow::{ensure, Context, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use codec::FileRecord;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{list_snapshots, Rdb, MAGIC, VERSION};

impl Rdb {
    /// Serializes `files` into a new snapshot and publishes it atomically.
    ///
    /// Returns the snapshot timestamp (unix seconds, also embedded in the
    /// body and the filename) and the published path.
    ///
    /// # Steps
    ///
    /// 1. Serialize the body and its trailing CRC into `dump-{nanos}.rdb.tmp`.
    /// 2. Flush and `sync_all` the temp file.
    /// 3. Rename to `dump-{snapshotTs}.rdb` (the publication point) and
    ///    fsync the parent directory so the rename survives a crash.
    /// 4. Prune to the newest `max_files` snapshots.
    ///
    /// Two saves within the same second produce the same final name; the
    /// second rename replaces the first. Callers are expected to snapshot
    /// no faster than once per second.
    ///
    /// # Errors
    ///
    /// Any I/O failure, a file name longer than `u16::MAX` bytes, or more
    /// than `u32::MAX` entries. On error the temp file is removed and no
    /// snapshot is published.
    pub fn save(&self, files: &[FileRecord]) -> Result<(i64, PathBuf)> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
        let snapshot_ts = now.as_secs() as i64;

        let tmp_path = self.dir.join(format!("dump-{}.rdb.tmp", now.as_nanos()));
        let final_path = self.dir.join(format!("dump-{}.rdb", snapshot_ts));

        if let Err(e) = self.write_snapshot(&tmp_path, snapshot_ts, files) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e);
        }

        std::fs::rename(&tmp_path, &final_path)
            .with_context(|| format!("failed to publish snapshot {}", final_path.display()))?;

        // Fsync the parent directory to ensure the rename is durable.
        if let Ok(dir) = std::fs::File::open(&self.dir) {
            let _ = dir.sync_all();
        }

        self.prune()?;

        Ok((snapshot_ts, final_path))
    }

    /// Writes the framed snapshot body to `tmp_path` and fsyncs it.
    fn write_snapshot(
        &self,
        tmp_path: &std::path::Path,
        snapshot_ts: i64,
        files: &[FileRecord],
    ) -> Result<()> {
        ensure!(
            files.len() <= u32::MAX as usize,
            "too many entries for one snapshot: {}",
            files.len()
        );

        let mut body = Vec::with_capacity(18 + files.len() * 32);
        body.extend_from_slice(MAGIC);
        body.write_u16::<LittleEndian>(VERSION)?;
        body.write_i64::<LittleEndian>(snapshot_ts)?;
        body.write_u32::<LittleEndian>(files.len() as u32)?;

        for file in files {
            let name = file.file_name.as_bytes();
            ensure!(
                name.len() <= u16::MAX as usize,
                "file name too long: {} bytes (id {})",
                name.len(),
                file.id
            );
            body.write_u64::<LittleEndian>(file.id)?;
            body.write_u64::<LittleEndian>(file.count)?;
            body.write_u16::<LittleEndian>(name.len() as u16)?;
            body.extend_from_slice(name);
        }

        let mut hasher = Crc32::new();
        hasher.update(&body);
        let crc = hasher.finalize();

        let raw_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        let mut w = BufWriter::new(raw_file);
        w.write_all(&body)?;
        w.write_u32::<LittleEndian>(crc)?;
        w.flush()?;
        w.into_inner()?.sync_all()?;
        Ok(())
    }

    /// Removes the oldest snapshots until at most `max_files` remain.
    fn prune(&self) -> Result<()> {
        let snapshots = list_snapshots(&self.dir)?;
        if snapshots.len() > self.max_files {
            for old in &snapshots[..snapshots.len() - self.max_files] {
                let _ = std::fs::remove_file(old);
            }
        }
        Ok(())
    }
}
