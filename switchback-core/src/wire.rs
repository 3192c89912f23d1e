//! Compressed stream wire format.
//!
//! One record per tick: `frame_len: u64`, `rung_index: u64`, then
//! `frame_len` payload bytes. Fields are native byte order with no
//! padding, so streams are not portable across hosts of different
//! endianness; the sender and receiver of a simulation run on the same
//! machine. The stream is terminated by end-of-stream between records;
//! end-of-stream inside a record is corruption.

use std::io::{Read, Write};

use bytes::Bytes;

use crate::codec::CompressedFrame;

/// Upper bound on a single compressed frame. A length above this is
/// treated as corruption rather than an allocation request.
pub const MAX_FRAME_LEN: u64 = 1 << 26;

/// Errors from wire record I/O.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("compressed stream ended mid-record at tick {tick}")]
    Truncated { tick: u64 },

    #[error("frame length {len} exceeds maximum {MAX_FRAME_LEN} at tick {tick}")]
    FrameTooLarge { tick: u64, len: u64 },

    #[error("wire I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One record read back from a compressed stream.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    /// Rung index signaled by the sender.
    pub rung: u64,
    /// Compressed frame bytes.
    pub payload: Bytes,
}

/// Writes one record: header, then the frame bytes.
///
/// # Errors
/// - `WireError::Io` - underlying write failed
pub fn write_record(
    writer: &mut impl Write,
    rung: usize,
    frame: &CompressedFrame,
) -> Result<(), WireError> {
    writer.write_all(&(frame.len() as u64).to_ne_bytes())?;
    writer.write_all(&(rung as u64).to_ne_bytes())?;
    writer.write_all(&frame.data)?;
    Ok(())
}

/// Reads the next record. `Ok(None)` on clean end-of-stream.
///
/// # Errors
/// - `WireError::Truncated` - stream ended inside a record
/// - `WireError::FrameTooLarge` - corrupt length field
/// - `WireError::Io` - underlying read failed
pub fn read_record(reader: &mut impl Read, tick: u64) -> Result<Option<FrameRecord>, WireError> {
    let mut len_bytes = [0u8; 8];
    match read_exact_or_eof(reader, &mut len_bytes)? {
        Filled::Eof => return Ok(None),
        Filled::Partial => return Err(WireError::Truncated { tick }),
        Filled::Complete => {}
    }
    let len = u64::from_ne_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge { tick, len });
    }

    let mut rung_bytes = [0u8; 8];
    if read_exact_or_eof(reader, &mut rung_bytes)? != Filled::Complete {
        return Err(WireError::Truncated { tick });
    }
    let rung = u64::from_ne_bytes(rung_bytes);

    let mut payload = vec![0u8; len as usize];
    if read_exact_or_eof(reader, &mut payload)? != Filled::Complete {
        return Err(WireError::Truncated { tick });
    }

    Ok(Some(FrameRecord {
        rung,
        payload: Bytes::from(payload),
    }))
}

#[derive(Debug, PartialEq, Eq)]
enum Filled {
    Complete,
    Partial,
    Eof,
}

fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> Result<Filled, WireError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Ok(if filled == 0 {
                    Filled::Eof
                } else {
                    Filled::Partial
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(WireError::Io(e)),
        }
    }
    Ok(Filled::Complete)
}
