//! Transaction layer: correlated exchanges, one-way sends and receives.

use std::io::Write;

use tracing::{debug, error, warn};

use super::Session;
use crate::error::{AppError, Result};
use crate::llrp::{ConnError, Connection, Message, MessageBody, MessageType, RecvWait};

impl<C: Connection, W: Write> Session<C, W> {
    /// Send a command and wait for its response.
    ///
    /// An ERROR_MESSAGE in place of the expected response is a failure.
    pub fn transact(&mut self, body: MessageBody) -> Result<Message> {
        let id = self.next_message_id()?;
        let msg = Message::new(id, body);
        self.dump("Transact sending", &msg);

        let reply = match self.conn.transact(&msg, self.transact_timeout()) {
            Ok(reply) => reply,
            Err(e) => {
                log_conn_error(&format!("{} transact failed", msg.name()), &e);
                return Err(AppError::Transport(e));
            }
        };
        self.dump("Transact received response", &reply);

        if reply.message_type() == MessageType::ErrorMessage {
            let expected = msg
                .message_type()
                .response_type()
                .map_or("a response", MessageType::name);
            error!("Received ERROR_MESSAGE instead of {expected}");
            return Err(AppError::UnexpectedReply { expected });
        }
        Ok(reply)
    }

    /// Send without waiting for a reply.
    pub fn send_message(&mut self, body: MessageBody) -> Result<()> {
        let id = self.next_message_id()?;
        let msg = Message::new(id, body);
        self.dump("Sending", &msg);

        self.conn.send(&msg).map_err(|e| {
            log_conn_error(&format!("{} send failed", msg.name()), &e);
            AppError::Transport(e)
        })
    }

    /// Receive the next message of any kind.
    ///
    /// An empty receive window is [`AppError::RecvTimeout`] and is not logged.
    pub fn recv_message(&mut self, wait: RecvWait) -> Result<Message> {
        match self.conn.recv(wait) {
            Ok(msg) => {
                self.dump("Message received", &msg);
                Ok(msg)
            }
            Err(e) if e.is_recv_timeout() => Err(AppError::RecvTimeout),
            Err(e) => {
                log_conn_error("recv_message failed", &e);
                Err(AppError::Transport(e))
            }
        }
    }

    /// Dump a message at verbosity 2. Serializes from a borrow only.
    fn dump(&self, heading: &str, msg: &Message) {
        if self.verbose < 2 {
            return;
        }
        match serde_json::to_string_pretty(msg) {
            Ok(text) => debug!("{heading} {} (id {})\n{text}", msg.name(), msg.id),
            Err(e) => warn!("Cannot render {} for diagnostics: {e}", msg.name()),
        }
    }
}

fn log_conn_error(what: &str, e: &ConnError) {
    error!("{what}, {}", e.what);
    if let Some(ref_type) = e.ref_type {
        error!("... reference type {ref_type}");
    }
    if let Some(ref_field) = e.ref_field {
        error!("... reference field {ref_field}");
    }
}
