//! LLRP reader protocol client.
//!
//! Binary message model, codec and a blocking TCP connection on port 5084.
//! Only the messages and parameters an inventory-and-access session needs
//! are modelled; unknown inbound parameters are skipped.

mod codec;
mod connection;
mod error;
mod io;
mod message;
mod params;
mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use codec::{decode_message, encode_message, peek_header};
pub use connection::{Connection, RecvWait, TcpConnection};
pub use error::{ConnError, ErrorKind, Result};
pub use message::{Category, Message, MessageBody, MessageType};
pub use params::*;
pub use types::{IMPINJ_VENDOR_ID, STATUS_SUCCESS};

/// Port readers listen on for client-initiated connections.
pub const DEFAULT_PORT: u16 = types::DEFAULT_PORT;

/// Memory bank numbers of a Gen2 tag.
pub mod memory_bank {
    pub const RESERVED: u8 = 0;
    pub const EPC: u8 = 1;
    pub const TID: u8 = 2;
    pub const USER: u8 = 3;
}

/// Air protocol identifier for EPC Class-1 Generation-2.
pub const AIR_PROTOCOL_C1G2: u8 = types::AIR_PROTOCOL_C1G2;

/// Status value of a successful connection attempt event.
pub const CONNECTION_ATTEMPT_SUCCESS: u16 = types::CONNECTION_ATTEMPT_SUCCESS;
