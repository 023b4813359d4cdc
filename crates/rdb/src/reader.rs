use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use crc32fast::Hasher as Crc32;
use codec::FileRecord;
use std::io::{self, Read};
use std::path::Path;

use crate::{list_snapshots, Rdb, RdbLoad, MAGIC};

/// Smallest possible snapshot: magic + version + ts + n + crc.
const MIN_LEN: usize = 4 + 2 + 8 + 4 + 4;

impl Rdb {
    /// Loads the newest snapshot.
    ///
    /// An empty directory is a fresh start: `snapshot_ts = 0`, no files.
    /// When the chosen file disappears between the listing and the read
    /// (retention pruning by another handle), the listing is retried and
    /// the loader settles on the next-newest snapshot.
    ///
    /// # Errors
    ///
    /// A snapshot that exists but fails validation (bad magic, short file,
    /// CRC mismatch, truncated entries, non-UTF-8 name) is an error: the
    /// ranking cannot be trusted from a damaged snapshot and there is no
    /// fallback to an older one.
    pub fn load_latest(&self) -> Result<RdbLoad> {
        loop {
            let snapshots = list_snapshots(&self.dir)?;
            let Some(path) = snapshots.last() else {
                return Ok(RdbLoad {
                    snapshot_ts: 0,
                    files: Vec::new(),
                    path: None,
                });
            };

            let data = match std::fs::read(path) {
                Ok(d) => d,
                // Pruned underneath us: go back to the listing.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to read {}", path.display()))
                }
            };

            let (snapshot_ts, files) = parse_snapshot(&data)
                .with_context(|| format!("invalid snapshot {}", path.display()))?;
            return Ok(RdbLoad {
                snapshot_ts,
                files,
                path: Some(path.clone()),
            });
        }
    }
}

/// Validates and decodes a snapshot body.
fn parse_snapshot(data: &[u8]) -> Result<(i64, Vec<FileRecord>)> {
    if data.len() < MIN_LEN {
        bail!("snapshot too small: {} bytes", data.len());
    }
    if &data[0..4] != MAGIC {
        bail!("bad snapshot magic");
    }

    let crc_stored = u32::from_le_bytes([
        data[data.len() - 4],
        data[data.len() - 3],
        data[data.len() - 2],
        data[data.len() - 1],
    ]);
    let mut hasher = Crc32::new();
    hasher.update(&data[..data.len() - 4]);
    if hasher.finalize() != crc_stored {
        bail!("snapshot crc mismatch");
    }

    let mut rdr = &data[4..data.len() - 4];
    let _version = rdr.read_u16::<LittleEndian>()?;
    let snapshot_ts = rdr.read_i64::<LittleEndian>()?;
    let n = rdr.read_u32::<LittleEndian>()?;

    let mut files = Vec::with_capacity(n.min(1 << 20) as usize);
    for _ in 0..n {
        files.push(read_entry(&mut rdr).context("truncated snapshot entry")?);
    }
    Ok((snapshot_ts, files))
}

/// Decodes one `id | count | name_len | name` entry.
fn read_entry(rdr: &mut &[u8]) -> Result<FileRecord> {
    let id = rdr.read_u64::<LittleEndian>()?;
    let count = rdr.read_u64::<LittleEndian>()?;
    let name_len = rdr.read_u16::<LittleEndian>()? as usize;

    let mut name = vec![0u8; name_len];
    rdr.read_exact(&mut name)?;
    let file_name = String::from_utf8(name).map_err(|_| anyhow::anyhow!("non-UTF-8 file name"))?;

    Ok(FileRecord {
        id,
        file_name,
        count,
    })
}
