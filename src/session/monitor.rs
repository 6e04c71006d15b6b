//! Report monitor: collects tag reports and reader events until a deadline.

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::Session;
use super::commands::Scenario;
use crate::config::MonitorConfig;
use crate::llrp::{Connection, MessageBody, ReaderEvent, ReaderEventNotificationData, RecvWait};

/// Poll interval used by the personnel scenario when none is configured.
const PERSONNEL_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// What one monitoring run saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorSummary {
    pub reports: u32,
    pub tag_entries: u32,
    pub events: u32,
    pub polls_sent: u32,
    pub unexpected: u32,
}

/// Receive loop with an absolute deadline and an optional poll timer.
#[derive(Debug, Clone)]
pub struct ReportMonitor {
    duration: Duration,
    slice_ms: u64,
    poll: Option<Duration>,
}

struct LoopState {
    start: Instant,
    poll_ref: Instant,
    done: bool,
    summary: MonitorSummary,
}

impl ReportMonitor {
    pub fn new(duration: Duration, slice_ms: u64, poll: Option<Duration>) -> Self {
        Self {
            duration,
            slice_ms: slice_ms.max(1),
            poll,
        }
    }

    pub fn from_config(config: &MonitorConfig, scenario: Scenario) -> Self {
        let poll = match config.poll_interval_secs {
            Some(secs) => Some(Duration::from_secs(secs)),
            None if scenario == Scenario::Personnel => Some(PERSONNEL_POLL_INTERVAL),
            None => None,
        };
        Self::new(Duration::from_secs(config.duration_secs), config.recv_slice_ms, poll)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll
    }

    /// Run until the deadline passes.
    ///
    /// Every receive waits at most one slice so the deadline and poll timer
    /// are re-evaluated even when the reader is silent. Nothing inside the
    /// loop is fatal.
    pub fn run<C: Connection, W: Write>(&self, session: &mut Session<C, W>) -> MonitorSummary {
        let start = Instant::now();
        let mut state = LoopState {
            start,
            poll_ref: start,
            done: false,
            summary: MonitorSummary::default(),
        };
        let slice = Duration::from_millis(self.slice_ms);

        while !state.done {
            let received = session.recv_message(RecvWait::Millis(self.slice_ms));

            let now = Instant::now();
            if now.duration_since(state.start) > self.duration {
                state.done = true;
            }

            if let Some(interval) = self.poll {
                if now.duration_since(state.poll_ref) > interval {
                    if session.send_message(MessageBody::GetReport).is_ok() {
                        state.summary.polls_sent += 1;
                    }
                    state.poll_ref = now;
                }
            }

            let msg = match received {
                Ok(msg) => msg,
                Err(e) if e.is_recv_timeout() => continue,
                Err(_) => {
                    // Already logged; do not spin on a dead socket, nor sleep past the deadline.
                    if !state.done {
                        let left = self.duration.saturating_sub(now.duration_since(state.start));
                        thread::sleep(slice.min(left));
                    }
                    continue;
                }
            };

            let name = msg.name();
            match msg.body {
                MessageBody::RoAccessReport(tags) => {
                    state.summary.reports += 1;
                    state.summary.tag_entries += tags.len() as u32;
                    session.print_tag_reports(&tags);
                }
                MessageBody::ReaderEventNotification(Some(data)) => {
                    state.summary.events += 1;
                    session.handle_reader_event(&data);
                }
                MessageBody::ReaderEventNotification(None) => {
                    warn!("READER_EVENT_NOTIFICATION without data");
                }
                MessageBody::Keepalive => {
                    debug!("Keepalive from reader");
                    let _ = session.send_message(MessageBody::KeepaliveAck);
                }
                _ => {
                    state.summary.unexpected += 1;
                    warn!("Ignored unexpected message during monitor: {name}");
                }
            }
        }

        info!(
            "Monitor finished: {} reports, {} tag entries, {} events, {} polls, {} unexpected",
            state.summary.reports,
            state.summary.tag_entries,
            state.summary.events,
            state.summary.polls_sent,
            state.summary.unexpected
        );
        state.summary
    }
}

impl<C: Connection, W: Write> Session<C, W> {
    /// Report antenna, exception and close events. A notification with
    /// none of those is reported as unhandled.
    pub(crate) fn handle_reader_event(&self, data: &ReaderEventNotificationData) {
        let mut handled = 0;

        for event in &data.events {
            match event {
                ReaderEvent::Antenna { event_type, antenna_id } => {
                    let state = match event_type {
                        0 => "disconnected",
                        1 => "connected",
                        _ => "?unknown-event?",
                    };
                    warn!("Antenna {antenna_id} is {state}");
                    handled += 1;
                }
                ReaderEvent::ReaderException { message: Some(text) } => {
                    warn!("ReaderException '{text}'");
                    handled += 1;
                }
                ReaderEvent::ReaderException { message: None } => {
                    warn!("ReaderException but no message");
                    handled += 1;
                }
                ReaderEvent::ConnectionClose => {
                    warn!("Reader is closing the connection");
                    handled += 1;
                }
                ReaderEvent::ConnectionAttempt { .. } | ReaderEvent::Other { .. } => {}
            }
        }

        if handled == 0 {
            warn!("Unexpected (unhandled) ReaderEvent");
        }
    }
}
