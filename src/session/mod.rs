//! Inventory-and-access session against one reader.
//!
//! A [`Session`] owns the connection, hands out message ids and writes report
//! lines to its sink. The orchestrator drives it through a fixed sequence of
//! steps; the monitor collects reports in between start and stop.

mod commands;
mod monitor;
mod orchestrator;
mod report;
mod status;
mod transport;

#[cfg(test)]
mod tests;

use std::io::{self, Write};
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::llrp::Connection;

// Re-export public API
pub use commands::{
    ACCESS_SPEC_ID, INVENTORY_PARAMETER_SPEC_ID, ROSPEC_ID, Scenario, access_spec, reader_config, rospec,
};
pub use monitor::{MonitorSummary, ReportMonitor};
pub use orchestrator::{
    OUTCOME_CONNECT_FAILED, OUTCOME_CONNECTION_SETUP_FAILED, OUTCOME_INVALID_CONFIG, OUTCOME_SUCCESS, STEP_NAMES,
    check_prerequisites, run,
};
pub use report::{
    EPC_NULL, EPC_UNKNOWN, TextBuf, format_antenna, format_epc, format_get_qt_result, format_read_result,
    format_seen, format_serialized_tid, format_set_qt_result, format_tag_report, format_write_result,
};
pub use status::check_status;

/// One client session.
///
/// Not safe for concurrent use: the orchestrator and monitor are the only
/// callers and run on one thread.
pub struct Session<C: Connection, W: Write = io::Stdout> {
    conn: C,
    /// Next id to hand out.
    message_id: u32,
    ids_exhausted: bool,
    verbose: u8,
    config: AppConfig,
    out: W,
    closed: bool,
}

impl<C: Connection, W: Write> Session<C, W> {
    /// Wrap an opened connection. Report lines go to `out`.
    pub fn new(conn: C, config: AppConfig, out: W) -> Self {
        let verbose = config.session.verbosity;
        Self {
            conn,
            message_id: 0,
            ids_exhausted: false,
            verbose,
            config,
            out,
            closed: false,
        }
    }

    /// Claim the next message id. Ids are never reused: once `u32::MAX`
    /// has been handed out every further claim fails.
    pub(crate) fn next_message_id(&mut self) -> Result<u32> {
        if self.ids_exhausted {
            return Err(AppError::IdsExhausted);
        }
        let id = self.message_id;
        match id.checked_add(1) {
            Some(next) => self.message_id = next,
            None => {
                error!("Message id space exhausted, no further commands can be sent");
                self.ids_exhausted = true;
            }
        }
        Ok(id)
    }

    /// Number of ids handed out so far.
    pub fn messages_issued(&self) -> u32 {
        self.message_id
    }

    pub fn verbose(&self) -> u8 {
        self.verbose
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Report sink.
    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn transact_timeout(&self) -> Duration {
        Duration::from_millis(self.config.session.transact_timeout_ms)
    }

    /// Write one finished report line.
    pub(crate) fn emit_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            warn!("Failed to write report line: {e}");
        }
    }

    /// Close the connection. Only the first call has any effect.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        debug!("Closing session after {} messages", self.message_id);
        if let Err(e) = self.conn.close() {
            warn!("Failed to close reader connection: {e}");
        }
    }
}

impl<C: Connection, W: Write> Drop for Session<C, W> {
    fn drop(&mut self) {
        self.close();
    }
}
