//! Error types and handling.

use thiserror::Error;

use crate::llrp::ConnError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Connection, socket or timeout failure below the protocol
    #[error("Transport error: {0}")]
    Transport(#[from] ConnError),

    /// Reader reported a failure status
    #[error("{context} failed, {description}")]
    Protocol { context: String, description: String },

    /// Response arrived without its mandatory status
    #[error("{0} missing LLRP status")]
    MissingStatus(String),

    /// Generic error reply in place of the expected response
    #[error("Received ERROR_MESSAGE instead of {expected}")]
    UnexpectedReply { expected: &'static str },

    /// Device identity or version does not meet requirements
    #[error("Prerequisite not met: {0}")]
    PrerequisiteNotMet(String),

    /// Nothing arrived within the receive window
    #[error("Receive timeout")]
    RecvTimeout,

    /// Every message id has been used once
    #[error("Message ids exhausted")]
    IdsExhausted,
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Create a prerequisite error with message
    pub fn prerequisite(msg: impl Into<String>) -> Self {
        Self::PrerequisiteNotMet(msg.into())
    }

    /// True for the "try again" outcome of a receive slice.
    pub fn is_recv_timeout(&self) -> bool {
        matches!(self, Self::RecvTimeout)
    }
}
