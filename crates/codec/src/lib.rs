//! # Codec - Record Framing
//!
//! Binary framing shared by the clickrank WAL segments and snapshot bodies,
//! plus the types both sides of the engine exchange.
//!
//! ## Frame Format
//!
//! ```text
//! [length: u32 LE][crc32: u32 LE][payload ...]
//! ```
//!
//! `length` counts the payload bytes only; the CRC32 (IEEE) covers the
//! payload only. A click payload is exactly 16 bytes:
//!
//! ```text
//! [file_id: u64 LE][ts: i64 LE]
//! ```
//!
//! ## Reader Policy
//!
//! A crash may leave a half-written frame at the end of a segment, so
//! [`FrameReader::next`] treats clean EOF and a truncated header/payload as
//! the end of the stream (`Ok(None)`). A CRC mismatch or an absurd length is
//! reported as [`CodecError::Corrupt`]: callers decide whether that stops a
//! replay silently (log policy) or aborts (snapshot policy).
//!
//! ## Example
//!
//! ```rust
//! use codec::{encode_click, decode_click, write_frame, FrameReader};
//! use std::io::Cursor;
//!
//! let mut buf = Vec::new();
//! write_frame(&mut buf, &encode_click(7, 1_700_000_000)).unwrap();
//!
//! let mut reader = FrameReader::new(Cursor::new(buf));
//! let mut payload = Vec::new();
//! assert!(reader.next(&mut payload).unwrap().is_some());
//! assert_eq!(decode_click(&payload).unwrap(), (7, 1_700_000_000));
//! ```

use byteorder::{LittleEndian, ReadBytesExt};
use crc32fast::Hasher as Crc32;
use std::io::{self, BufReader, Read, Write};

use thiserror::Error;

/// Exact payload size of a click record: `file_id: u64` + `ts: i64`.
pub const CLICK_PAYLOAD_LEN: usize = 16;

/// On-disk size of one framed click record (header + payload).
pub const CLICK_FRAME_LEN: u64 = 8 + CLICK_PAYLOAD_LEN as u64;

/// Safety cap on frame payloads; anything larger is treated as corruption.
const MAX_PAYLOAD_LEN: u32 = 1024 * 1024;

/// A file and its accumulated click count.
///
/// This is the unit the ranking orders, the snapshot serializes, and the
/// query surface returns. `count` is never zero for a record that made it
/// into the ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Unique file id assigned at upload time.
    pub id: u64,
    /// Display name resolved from the file-metadata keystore. May be empty
    /// when the keystore has no entry for the id.
    pub file_name: String,
    /// Total accepted clicks.
    pub count: u64,
}

/// Errors produced while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A frame failed CRC validation or declared an impossible length.
    #[error("corrupt frame")]
    Corrupt,
}

/// Encodes a click record into its fixed 16-byte payload.
pub fn encode_click(file_id: u64, ts: i64) -> [u8; CLICK_PAYLOAD_LEN] {
    let mut payload = [0u8; CLICK_PAYLOAD_LEN];
    payload[0..8].copy_from_slice(&file_id.to_le_bytes());
    payload[8..16].copy_from_slice(&ts.to_le_bytes());
    payload
}

/// Decodes a click payload back into `(file_id, ts)`.
///
/// Any payload that is not exactly [`CLICK_PAYLOAD_LEN`] bytes is corrupt:
/// the click record format has no variable-length fields.
pub fn decode_click(payload: &[u8]) -> Result<(u64, i64), CodecError> {
    if payload.len() != CLICK_PAYLOAD_LEN {
        return Err(CodecError::Corrupt);
    }
    let mut rdr = payload;
    let file_id = rdr.read_u64::<LittleEndian>()?;
    let ts = rdr.read_i64::<LittleEndian>()?;
    Ok((file_id, ts))
}

/// Appends one frame (`length | crc | payload`) to `w` in a single write.
///
/// The frame is assembled in a stack/heap buffer first so the underlying
/// writer sees exactly one `write_all` call per record.
pub fn write_frame<W: Write>(w: &mut W, payload: &[u8]) -> Result<(), CodecError> {
    if payload.len() > MAX_PAYLOAD_LEN as usize {
        return Err(CodecError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "frame payload too large",
        )));
    }

    let mut hasher = Crc32::new();
    hasher.update(payload);
    let crc = hasher.finalize();

    let mut frame = Vec::with_capacity(8 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(payload);

    w.write_all(&frame)?;
    Ok(())
}

/// Sequential frame reader.
///
/// Generic over any `Read` implementor so tests can replay from in-memory
/// buffers. Yields one validated payload at a time into a caller-supplied
/// buffer to avoid per-record allocation.
pub struct FrameReader<R: Read> {
    rdr: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    /// Wraps a reader for sequential frame decoding.
    pub fn new(reader: R) -> Self {
        FrameReader {
            rdr: BufReader::new(reader),
        }
    }

    /// Reads the next frame into `payload`.
    ///
    /// Returns `Ok(Some(len))` with the payload length on success and
    /// `Ok(None)` at the end of the stream. The end of the stream is either
    /// a clean EOF or a truncated header/payload left by a crash mid-append.
    ///
    /// # Errors
    ///
    /// - [`CodecError::Corrupt`]: CRC mismatch, or a declared length of
    ///   zero or beyond the safety cap.
    /// - [`CodecError::Io`]: any other read failure.
    pub fn next(&mut self, payload: &mut Vec<u8>) -> Result<Option<usize>, CodecError> {
        let length = match self.rdr.read_u32::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(CodecError::Io(e)),
        };

        if length == 0 || length > MAX_PAYLOAD_LEN {
            return Err(CodecError::Corrupt);
        }

        let crc = match self.rdr.read_u32::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(CodecError::Io(e)),
        };

        payload.clear();
        payload.resize(length as usize, 0);
        match self.rdr.read_exact(payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                // truncated tail; treat as EOF
                return Ok(None);
            }
            Err(e) => return Err(CodecError::Io(e)),
        }

        let mut hasher = Crc32::new();
        hasher.update(payload);
        if hasher.finalize() != crc {
            return Err(CodecError::Corrupt);
        }

        Ok(Some(length as usize))
    }
}
