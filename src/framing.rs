//! Length-prefixed framing used by the browser's Native Messaging channel.
//!
//! Each frame is a `u32` length in native byte order followed by that many bytes of one UTF-8
//! JSON document. There is no batching: one document per frame.

use std::io::{self, ErrorKind, Read, Write};

use serde::Serialize;

/// Size of the length prefix.
pub const PREFIX_LEN: usize = 4;

/// Read one frame.
///
/// Returns `Ok(None)` when the peer closed the stream, including a close in the middle of a
/// frame (short read). Any other I/O failure is returned as is.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; PREFIX_LEN];
    match reader.read_exact(&mut prefix) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_ne_bytes(prefix) as usize;
    let mut body = vec![0u8; len];
    match reader.read_exact(&mut body) {
        Ok(()) => Ok(Some(body)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write `payload` as a single frame and flush.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        io::Error::new(
            ErrorKind::InvalidInput,
            format!("frame of {} bytes does not fit a u32 prefix", payload.len()),
        )
    })?;
    writer.write_all(&len.to_ne_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Serialize `message` as JSON and write it as one frame.
pub fn send_message<W: Write, T: Serialize + ?Sized>(writer: &mut W, message: &T) -> io::Result<()> {
    let bytes = serde_json::to_vec(message).map_err(io::Error::from)?;
    write_frame(writer, &bytes)
}
