//! Connection abstraction and the TCP implementation.

use std::collections::VecDeque;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::codec::{decode_message, encode_message};
use super::error::{ConnError, ErrorKind, Result};
use super::io::{PartialFrame, read_frame, set_timeout, write_frame};
use super::message::{Message, MessageType};

/// How long [`Connection::recv`] may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvWait {
    /// Return immediately when nothing is buffered.
    Poll,
    /// Block until a message arrives.
    Forever,
    /// Block for at most this many milliseconds.
    Millis(u64),
}

impl RecvWait {
    pub fn as_duration(self) -> Option<Duration> {
        match self {
            Self::Poll => Some(Duration::ZERO),
            Self::Forever => None,
            Self::Millis(ms) => Some(Duration::from_millis(ms)),
        }
    }
}

impl From<i64> for RecvWait {
    /// 0 polls, negative blocks forever, positive is a millisecond ceiling.
    fn from(ms: i64) -> Self {
        match ms {
            0 => Self::Poll,
            n if n < 0 => Self::Forever,
            n => Self::Millis(n.unsigned_abs()),
        }
    }
}

/// Synchronous message exchange with one reader.
///
/// Implementations are not safe for concurrent use; one caller drives the
/// connection at a time.
pub trait Connection {
    /// Establish the underlying link.
    fn open(&mut self) -> Result<()>;

    /// Release the link. Calling it on a closed connection is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Send without waiting for anything back.
    fn send(&mut self, msg: &Message) -> Result<()>;

    /// Next inbound message of any kind.
    fn recv(&mut self, wait: RecvWait) -> Result<Message>;

    /// Send a command and wait for its correlated response or an error reply.
    fn transact(&mut self, msg: &Message, timeout: Duration) -> Result<Message>;
}

/// LLRP over TCP.
#[derive(Debug)]
pub struct TcpConnection {
    addr: SocketAddr,
    connect_timeout: Duration,
    max_frame: usize,
    stream: Option<TcpStream>,
    /// Messages that arrived while a transaction waited for something else.
    pending: VecDeque<Message>,
    /// Start of a frame cut off by a closing receive window.
    partial: PartialFrame,
}

impl TcpConnection {
    /// Resolve the reader address. Fails when the host cannot be resolved.
    pub fn new(host: &str, port: u16, connect_timeout: Duration, max_frame: usize) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| ConnError::new(ErrorKind::Connect, format!("cannot resolve {host}:{port}: {e}")))?
            .next()
            .ok_or_else(|| ConnError::new(ErrorKind::Connect, format!("no address for {host}:{port}")))?;

        Ok(Self {
            addr,
            connect_timeout,
            max_frame,
            stream: None,
            pending: VecDeque::new(),
            partial: PartialFrame::default(),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| ConnError::new(ErrorKind::NotConnected, "connection is not open"))
    }

    fn read_message(&mut self, deadline: Option<Instant>) -> Result<Message> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ConnError::new(ErrorKind::NotConnected, "connection is not open"))?;
        let frame = read_frame(stream, &mut self.partial, deadline, self.max_frame, set_timeout)?;
        decode_message(&frame)
    }
}

impl Connection for TcpConnection {
    fn open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        info!("Connecting to reader at {} (timeout={:?})", self.addr, self.connect_timeout);
        let stream = TcpStream::connect_timeout(&self.addr, self.connect_timeout)
            .map_err(|e| ConnError::new(ErrorKind::Connect, format!("failed to connect to {}: {e}", self.addr)))?;
        stream
            .set_nodelay(true)
            .map_err(|e| ConnError::new(ErrorKind::Connect, format!("socket setup failed: {e}")))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.pending.clear();
        if !self.partial.is_empty() {
            debug!("Discarding a partially received frame");
            self.partial.clear();
        }
        if let Some(stream) = self.stream.take() {
            debug!("Closing connection to {}", self.addr);
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                // Already reset by the peer is fine.
                if e.kind() != std::io::ErrorKind::NotConnected {
                    return Err(ConnError::new(ErrorKind::SendFailed, format!("shutdown failed: {e}")));
                }
            }
        }
        Ok(())
    }

    fn send(&mut self, msg: &Message) -> Result<()> {
        let frame = encode_message(msg)?;
        write_frame(self.stream()?, &frame)
    }

    fn recv(&mut self, wait: RecvWait) -> Result<Message> {
        if let Some(msg) = self.pending.pop_front() {
            return Ok(msg);
        }
        let deadline = wait.as_duration().map(|w| Instant::now() + w);
        self.read_message(deadline)
    }

    fn transact(&mut self, msg: &Message, timeout: Duration) -> Result<Message> {
        let request = msg.message_type();
        let expected = request.response_type().ok_or_else(|| {
            ConnError::new(ErrorKind::Encode, format!("{} does not expect a response", request.name()))
        })?;

        self.send(msg)?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(transact_timeout(expected));
            }
            let reply = match self.read_message(Some(deadline)) {
                Ok(reply) => reply,
                Err(e) if e.is_recv_timeout() => return Err(transact_timeout(expected)),
                Err(e) => return Err(e),
            };
            let kind = reply.message_type();
            if reply.id == msg.id && (kind == expected || kind == MessageType::ErrorMessage) {
                return Ok(reply);
            }
            debug!("Queued {} (id {}) while waiting for {}", reply.name(), reply.id, expected.name());
            self.pending.push_back(reply);
        }
    }
}

fn transact_timeout(expected: MessageType) -> ConnError {
    ConnError {
        kind: ErrorKind::Timeout,
        what: format!("no {} before timeout", expected.name()),
        ref_type: Some(expected.name()),
        ref_field: None,
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close reader connection: {e}");
        }
    }
}
