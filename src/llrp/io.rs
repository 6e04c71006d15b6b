//! Framed socket I/O with receive windows.

use super::error::{ConnError, ErrorKind, Result};
use super::types::HEADER_SIZE;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};
use tracing::{error, trace};

/// Shortest window the socket accepts; stands in for a non-blocking poll.
const POLL_TIMEOUT: Duration = Duration::from_millis(1);

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Bytes of a frame that has not fully arrived yet.
///
/// A receive window that closes mid-frame leaves them here, and the next
/// read resumes the same frame.
#[derive(Debug, Default)]
pub(crate) struct PartialFrame {
    buf: Vec<u8>,
}

impl PartialFrame {
    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }

    /// Bytes still missing: the header first, then the body it declares.
    fn missing(&self, max_frame: usize) -> Result<usize> {
        if self.buf.len() < HEADER_SIZE {
            return Ok(HEADER_SIZE - self.buf.len());
        }
        let length = u32::from_be_bytes([self.buf[2], self.buf[3], self.buf[4], self.buf[5]]) as usize;
        if length < HEADER_SIZE {
            return Err(ConnError::decode(
                format!("frame length {length} shorter than header"),
                "message header",
                Some("length"),
            ));
        }
        if length > max_frame {
            error!("Frame too large: {length} bytes (limit {max_frame})");
            return Err(ConnError::decode(
                format!("frame length {length} exceeds limit {max_frame}"),
                "message header",
                Some("length"),
            ));
        }
        Ok(length - self.buf.len())
    }
}

/// Write one encoded frame.
pub(crate) fn write_frame<W: Write>(stream: &mut W, frame: &[u8]) -> Result<()> {
    trace!("TX ({} bytes): {:02X?}", frame.len(), &frame[..frame.len().min(32)]);
    stream
        .write_all(frame)
        .and_then(|()| stream.flush())
        .map_err(|e| {
            error!("Write failed: {e}");
            ConnError::new(ErrorKind::SendFailed, format!("write failed: {e}"))
        })
}

/// Read the next frame, waiting until `deadline` (`None` = forever).
///
/// Every socket read is bounded by what is left of the window, including
/// reads in the middle of a frame. When the window closes first the bytes
/// read so far stay in `partial` and a receive timeout is returned.
/// `set_wait` applies the per-read timeout to the stream.
pub(crate) fn read_frame<R: Read>(
    stream: &mut R,
    partial: &mut PartialFrame,
    deadline: Option<Instant>,
    max_frame: usize,
    mut set_wait: impl FnMut(&mut R, Option<Duration>) -> Result<()>,
) -> Result<Vec<u8>> {
    let mut first_read = true;
    loop {
        let missing = partial.missing(max_frame).inspect_err(|_| partial.clear())?;
        if missing == 0 {
            let frame = std::mem::take(&mut partial.buf);
            trace!("RX ({} bytes): {:02X?}", frame.len(), &frame[..frame.len().min(32)]);
            return Ok(frame);
        }

        let wait = match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                // A poll still gets its one read.
                if left.is_zero() && !first_read {
                    return Err(ConnError::recv_timeout());
                }
                Some(left.max(POLL_TIMEOUT))
            }
            None => None,
        };
        first_read = false;
        set_wait(stream, wait)?;

        let start = partial.buf.len();
        partial.buf.resize(start + missing, 0);
        match stream.read(&mut partial.buf[start..]) {
            Ok(0) => {
                partial.clear();
                let what = if start == 0 {
                    "peer closed the connection"
                } else {
                    "connection closed mid-frame"
                };
                return Err(ConnError::new(ErrorKind::Closed, what));
            }
            Ok(n) => partial.buf.truncate(start + n),
            Err(e) => {
                partial.buf.truncate(start);
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                if is_timeout(&e) {
                    if start > 0 {
                        trace!("Receive window closed with {start} bytes of a frame buffered");
                    }
                    return Err(ConnError::recv_timeout());
                }
                partial.clear();
                error!("Read failed: {e}");
                return Err(ConnError::new(ErrorKind::RecvFailed, format!("read failed: {e}")));
            }
        }
    }
}

/// Apply a read timeout to the socket (`None` blocks).
pub(crate) fn set_timeout(stream: &mut TcpStream, wait: Option<Duration>) -> Result<()> {
    stream
        .set_read_timeout(wait)
        .map_err(|e| ConnError::new(ErrorKind::RecvFailed, format!("cannot set read timeout: {e}")))
}
