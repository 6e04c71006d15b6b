//! Connection-level error details.

use std::fmt;

use thiserror::Error;

/// What went wrong below the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No message arrived within the receive window.
    RecvTimeout,
    /// A transaction did not see its response in time.
    Timeout,
    /// Writing to the socket failed.
    SendFailed,
    /// Reading from the socket failed.
    RecvFailed,
    /// The peer closed the connection.
    Closed,
    /// An inbound frame could not be decoded.
    Decode,
    /// An outbound message could not be encoded.
    Encode,
    /// Operation attempted without an open connection.
    NotConnected,
    /// Opening the connection failed.
    Connect,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RecvTimeout => "recv timeout",
            Self::Timeout => "timeout",
            Self::SendFailed => "send failed",
            Self::RecvFailed => "recv failed",
            Self::Closed => "connection closed",
            Self::Decode => "decode error",
            Self::Encode => "encode error",
            Self::NotConnected => "not connected",
            Self::Connect => "connect failed",
        };
        f.write_str(name)
    }
}

/// Structured error details reported by a [`Connection`](super::Connection).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {what}")]
pub struct ConnError {
    pub kind: ErrorKind,
    /// Human-readable reason.
    pub what: String,
    /// Message or parameter type the error refers to, if known.
    pub ref_type: Option<&'static str>,
    /// Field the error refers to, if known.
    pub ref_field: Option<&'static str>,
}

impl ConnError {
    pub fn new(kind: ErrorKind, what: impl Into<String>) -> Self {
        Self {
            kind,
            what: what.into(),
            ref_type: None,
            ref_field: None,
        }
    }

    /// Create a decode error pointing at a type and field.
    pub fn decode(what: impl Into<String>, ref_type: &'static str, ref_field: Option<&'static str>) -> Self {
        Self {
            kind: ErrorKind::Decode,
            what: what.into(),
            ref_type: Some(ref_type),
            ref_field,
        }
    }

    pub fn recv_timeout() -> Self {
        Self::new(ErrorKind::RecvTimeout, "no message within receive window")
    }

    pub fn is_recv_timeout(&self) -> bool {
        self.kind == ErrorKind::RecvTimeout
    }
}

/// Result type for connection operations.
pub type Result<T> = std::result::Result<T, ConnError>;
