//! Session tests against a scripted in-memory connection.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use super::*;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::llrp::{
    ConnError, Epc, ErrorKind, GeneralDeviceCapabilities, IMPINJ_VENDOR_ID, LlrpStatus, Message, MessageBody,
    MessageType, OpSpecResult, ReaderEvent, ReaderEventNotificationData, RecvWait, TagReportData,
};

/// How the scripted reader answers one command type.
#[derive(Clone)]
enum Reply {
    Status(LlrpStatus),
    NoStatus,
    ErrorMessage,
    Timeout,
    Capabilities(GeneralDeviceCapabilities),
}

#[derive(Default)]
struct Script {
    /// Everything the session sent, in order.
    sent: Vec<Message>,
    /// Unsolicited messages handed out by `recv`.
    inbound: VecDeque<Message>,
    /// Reply for a command type, optionally only its Nth (1-based) send.
    overrides: Vec<(MessageType, Option<usize>, Reply)>,
    closes: u32,
    /// Peer has gone away: every receive fails at once.
    peer_closed: bool,
}

impl Script {
    fn sent_types(&self) -> Vec<MessageType> {
        self.sent.iter().map(Message::message_type).collect()
    }
}

/// Shared handle so the test can inspect the script after the session
/// owns the connection.
#[derive(Clone, Default)]
struct ScriptedConnection(Rc<RefCell<Script>>);

impl ScriptedConnection {
    fn push_inbound(&self, body: MessageBody) {
        self.0.borrow_mut().inbound.push_back(Message::new(0, body));
    }

    fn answer(&self, kind: MessageType, reply: Reply) {
        self.0.borrow_mut().overrides.push((kind, None, reply));
    }

    fn answer_nth(&self, kind: MessageType, nth: usize, reply: Reply) {
        self.0.borrow_mut().overrides.push((kind, Some(nth), reply));
    }

    fn sent_types(&self) -> Vec<MessageType> {
        self.0.borrow().sent_types()
    }

    fn closes(&self) -> u32 {
        self.0.borrow().closes
    }
}

fn impinj_caps() -> GeneralDeviceCapabilities {
    GeneralDeviceCapabilities {
        max_antennas: 4,
        can_set_antenna_properties: false,
        has_utc_clock: true,
        manufacturer: IMPINJ_VENDOR_ID,
        model: 2001002,
        firmware_version: "5.12.1.240".to_string(),
    }
}

impl Connection for ScriptedConnection {
    fn open(&mut self) -> crate::llrp::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> crate::llrp::Result<()> {
        self.0.borrow_mut().closes += 1;
        Ok(())
    }

    fn send(&mut self, msg: &Message) -> crate::llrp::Result<()> {
        self.0.borrow_mut().sent.push(msg.clone());
        Ok(())
    }

    fn recv(&mut self, wait: RecvWait) -> crate::llrp::Result<Message> {
        if let Some(msg) = self.0.borrow_mut().inbound.pop_front() {
            return Ok(msg);
        }
        if self.0.borrow().peer_closed {
            return Err(ConnError::new(ErrorKind::Closed, "peer closed the connection"));
        }
        if let Some(wait) = wait.as_duration() {
            thread::sleep(wait);
        }
        Err(ConnError::recv_timeout())
    }

    fn transact(&mut self, msg: &Message, _timeout: Duration) -> crate::llrp::Result<Message> {
        let mut script = self.0.borrow_mut();
        script.sent.push(msg.clone());

        let kind = msg.message_type();
        let occurrence = script.sent.iter().filter(|m| m.message_type() == kind).count();
        let reply = script
            .overrides
            .iter()
            .find(|(k, nth, _)| *k == kind && nth.is_none_or(|n| n == occurrence))
            .map(|(_, _, r)| r.clone())
            .unwrap_or_else(|| match kind {
                MessageType::GetReaderCapabilities => Reply::Capabilities(impinj_caps()),
                _ => Reply::Status(LlrpStatus::success()),
            });
        let rsp = kind.response_type().unwrap_or(MessageType::ErrorMessage);

        match reply {
            Reply::Status(status) => Ok(Message::response(msg.id, rsp, Some(status))),
            Reply::NoStatus => Ok(Message::response(msg.id, rsp, None)),
            Reply::ErrorMessage => Ok(Message::new(
                msg.id,
                MessageBody::ErrorMessage {
                    status: Some(LlrpStatus::failure(100, Some("unsupported message"))),
                },
            )),
            Reply::Timeout => {
                let mut err = ConnError::new(ErrorKind::Timeout, "no response within timeout");
                err.ref_type = Some(rsp.name());
                Err(err)
            }
            Reply::Capabilities(general) => Ok(Message::new(
                msg.id,
                MessageBody::Capabilities {
                    status: Some(LlrpStatus::success()),
                    general: Some(general),
                },
            )),
        }
    }
}

fn connection_ok() -> MessageBody {
    MessageBody::ReaderEventNotification(Some(ReaderEventNotificationData {
        timestamp_us: Some(1),
        events: vec![ReaderEvent::ConnectionAttempt { status: 0 }],
    }))
}

fn quick_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.reader.host = "reader.test".to_string();
    config.session.connection_status_wait_ms = 10;
    config.monitor.duration_secs = 0;
    config.monitor.recv_slice_ms = 10;
    config
}

fn session(conn: &ScriptedConnection, config: AppConfig) -> Session<ScriptedConnection, Vec<u8>> {
    Session::new(conn.clone(), config, Vec::new())
}

fn sample_report() -> MessageBody {
    MessageBody::RoAccessReport(vec![
        TagReportData {
            epc: Some(Epc::Epc96([
                0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55,
            ])),
            op_spec_results: vec![OpSpecResult::Read {
                result: 0,
                op_spec_id: 1,
                data: vec![0x1234, 0x5678],
            }],
            ..Default::default()
        },
        TagReportData::default(),
    ])
}

#[test]
fn test_message_ids_start_at_zero_and_increase() {
    let conn = ScriptedConnection::default();
    let mut s = session(&conn, quick_config());
    assert_eq!(s.next_message_id().unwrap(), 0);
    assert_eq!(s.next_message_id().unwrap(), 1);
    assert_eq!(s.messages_issued(), 2);
}

#[test]
fn test_message_ids_are_not_reused_after_exhaustion() {
    let conn = ScriptedConnection::default();
    let mut s = session(&conn, quick_config());
    s.message_id = u32::MAX - 1;
    assert_eq!(s.next_message_id().unwrap(), u32::MAX - 1);
    assert_eq!(s.next_message_id().unwrap(), u32::MAX);
    assert!(matches!(s.next_message_id(), Err(AppError::IdsExhausted)));

    // Commands fail before reaching the connection.
    assert!(matches!(s.transact(MessageBody::GetReport), Err(AppError::IdsExhausted)));
    assert!(matches!(s.send_message(MessageBody::GetReport), Err(AppError::IdsExhausted)));
    drop(s);
    assert!(conn.sent_types().is_empty());
}

#[test]
fn test_full_sequence_succeeds() {
    let conn = ScriptedConnection::default();
    conn.push_inbound(connection_ok());
    conn.push_inbound(sample_report());

    let mut s = session(&conn, quick_config());
    assert_eq!(s.execute(), OUTCOME_SUCCESS);
    assert!(s.is_closed());

    let out = String::from_utf8(s.output().clone()).unwrap();
    assert!(out.contains("epc=AABB-CCDD-EEFF-0011-2233-4455\n    READ result=0 Data=1234-5678"));
    assert!(out.contains("epc=--null epc---"));
    drop(s);

    assert_eq!(
        conn.sent_types(),
        vec![
            MessageType::ImpinjEnableExtensions,
            MessageType::SetReaderConfig,
            MessageType::GetReaderCapabilities,
            MessageType::SetReaderConfig,
            MessageType::AddRoSpec,
            MessageType::AddAccessSpec,
            MessageType::EnableAccessSpec,
            MessageType::EnableRoSpec,
            MessageType::StartRoSpec,
            MessageType::StopRoSpec,
            MessageType::SetReaderConfig,
            MessageType::CloseConnection,
        ]
    );

    let ids: Vec<u32> = conn.0.borrow().sent.iter().map(|m| m.id).collect();
    assert_eq!(ids, (0..12).collect::<Vec<u32>>());
    assert_eq!(conn.closes(), 1);
}

#[test]
fn test_capability_mismatch_stops_before_specs() {
    let conn = ScriptedConnection::default();
    conn.push_inbound(connection_ok());
    conn.answer(
        MessageType::GetReaderCapabilities,
        Reply::Capabilities(GeneralDeviceCapabilities {
            manufacturer: 1,
            ..impinj_caps()
        }),
    );

    let mut s = session(&conn, quick_config());
    assert_eq!(s.execute(), 4);
    drop(s);

    let types = conn.sent_types();
    assert!(!types.contains(&MessageType::AddRoSpec));
    assert!(!types.contains(&MessageType::AddAccessSpec));
    assert_eq!(
        &types[types.len() - 2..],
        &[MessageType::SetReaderConfig, MessageType::CloseConnection]
    );
    assert_eq!(conn.closes(), 1);
}

/// Teardown after a failed forward step: cleanup reset, then CLOSE_CONNECTION.
fn assert_cleanup_follows(conn: &ScriptedConnection, kind: MessageType, nth: usize) {
    let types = conn.sent_types();
    let failed_at = types
        .iter()
        .enumerate()
        .filter(|(_, t)| **t == kind)
        .nth(nth - 1)
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(
        &types[failed_at + 1..],
        &[MessageType::SetReaderConfig, MessageType::CloseConnection],
        "{} #{nth}",
        kind.name()
    );
    assert_eq!(conn.closes(), 1);
}

#[test]
fn test_each_failing_step_reports_its_code() {
    // SET_READER_CONFIG is sent by step 3 (factory reset) and step 5
    // (operation config), so those are told apart by occurrence.
    let cases = [
        (MessageType::ImpinjEnableExtensions, 1, 2),
        (MessageType::SetReaderConfig, 1, 3),
        (MessageType::GetReaderCapabilities, 1, 4),
        (MessageType::SetReaderConfig, 2, 5),
        (MessageType::AddRoSpec, 1, 6),
        (MessageType::AddAccessSpec, 1, 7),
        (MessageType::EnableAccessSpec, 1, 8),
        (MessageType::EnableRoSpec, 1, 9),
        (MessageType::StartRoSpec, 1, 10),
        (MessageType::StopRoSpec, 1, 12),
    ];
    for (kind, nth, code) in cases {
        let conn = ScriptedConnection::default();
        conn.push_inbound(connection_ok());
        conn.answer_nth(kind, nth, Reply::Status(LlrpStatus::failure(100, Some("rejected"))));

        let mut s = session(&conn, quick_config());
        assert_eq!(s.execute(), code, "{} #{nth}", kind.name());
        drop(s);

        assert_cleanup_follows(&conn, kind, nth);
    }
}

#[test]
fn test_capabilities_status_failure_is_step_four() {
    let conn = ScriptedConnection::default();
    conn.push_inbound(connection_ok());
    conn.answer(
        MessageType::GetReaderCapabilities,
        Reply::Status(LlrpStatus::failure(101, Some("busy"))),
    );

    let mut s = session(&conn, quick_config());
    assert_eq!(s.execute(), 4);
    drop(s);

    // Failed on status, before any prerequisite was looked at.
    let types = conn.sent_types();
    assert!(!types.contains(&MessageType::AddRoSpec));
    assert_cleanup_follows(&conn, MessageType::GetReaderCapabilities, 1);
}

#[test]
fn test_cleanup_reset_runs_when_extensions_fail() {
    let conn = ScriptedConnection::default();
    conn.push_inbound(connection_ok());
    conn.answer(MessageType::ImpinjEnableExtensions, Reply::ErrorMessage);

    let mut s = session(&conn, quick_config());
    assert_eq!(s.execute(), 2);
    drop(s);

    assert_eq!(
        conn.sent_types(),
        vec![
            MessageType::ImpinjEnableExtensions,
            MessageType::SetReaderConfig,
            MessageType::CloseConnection,
        ]
    );
    let cleanup = conn.0.borrow().sent[1].clone();
    match cleanup.body {
        MessageBody::SetReaderConfig(cfg) => assert!(cfg.reset_to_factory_default),
        other => panic!("expected cleanup reset, got {other:?}"),
    }
}

#[test]
fn test_close_connection_failure_still_closes_socket() {
    let conn = ScriptedConnection::default();
    conn.push_inbound(connection_ok());
    conn.answer(MessageType::CloseConnection, Reply::Timeout);

    let mut s = session(&conn, quick_config());
    assert_eq!(s.execute(), OUTCOME_SUCCESS);
    drop(s);

    assert_eq!(conn.sent_types().last(), Some(&MessageType::CloseConnection));
    assert_eq!(conn.closes(), 1);
}

#[test]
fn test_missing_status_fails_step() {
    let conn = ScriptedConnection::default();
    conn.push_inbound(connection_ok());
    conn.answer(MessageType::ImpinjEnableExtensions, Reply::NoStatus);

    let mut s = session(&conn, quick_config());
    assert_eq!(s.execute(), 2);
}

#[test]
fn test_transact_timeout_is_transport_error() {
    let conn = ScriptedConnection::default();
    conn.answer(MessageType::EnableRoSpec, Reply::Timeout);

    let mut s = session(&conn, quick_config());
    let err = s
        .transact(MessageBody::EnableRoSpec { rospec_id: ROSPEC_ID })
        .unwrap_err();
    match err {
        AppError::Transport(e) => {
            assert_eq!(e.kind, ErrorKind::Timeout);
            assert_eq!(e.ref_type, Some("ENABLE_ROSPEC_RESPONSE"));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(conn.sent_types(), vec![MessageType::EnableRoSpec]);
}

#[test]
fn test_transact_timeout_in_sequence_is_not_retried() {
    let conn = ScriptedConnection::default();
    conn.push_inbound(connection_ok());
    conn.answer(MessageType::EnableRoSpec, Reply::Timeout);

    let mut s = session(&conn, quick_config());
    assert_eq!(s.execute(), 9);
    drop(s);

    let attempts = conn
        .sent_types()
        .iter()
        .filter(|t| **t == MessageType::EnableRoSpec)
        .count();
    assert_eq!(attempts, 1);
}

#[test]
fn test_error_message_reply_is_unexpected() {
    let conn = ScriptedConnection::default();
    conn.answer(MessageType::AddAccessSpec, Reply::ErrorMessage);

    let mut s = session(&conn, quick_config());
    let op = s.config().operation.clone();
    let spec = access_spec(Scenario::ReadTid, &op, &mut rand::thread_rng());
    let err = s.transact(MessageBody::AddAccessSpec(Box::new(spec))).unwrap_err();
    assert!(matches!(
        err,
        AppError::UnexpectedReply {
            expected: "ADD_ACCESSSPEC_RESPONSE"
        }
    ));
}

#[test]
fn test_no_connection_event_skips_cleanup() {
    let conn = ScriptedConnection::default();

    let mut s = session(&conn, quick_config());
    assert_eq!(s.execute(), 1);
    drop(s);

    assert!(conn.sent_types().is_empty());
    assert_eq!(conn.closes(), 1);
}

#[test]
fn test_wrong_first_message_fails_status_check() {
    let conn = ScriptedConnection::default();
    conn.push_inbound(MessageBody::ReaderEventNotification(Some(ReaderEventNotificationData {
        timestamp_us: None,
        events: vec![ReaderEvent::ConnectionAttempt { status: 4 }],
    })));

    let mut s = session(&conn, quick_config());
    assert_eq!(s.execute(), 1);
}

#[test]
fn test_close_runs_once() {
    let conn = ScriptedConnection::default();
    let mut s = session(&conn, quick_config());
    s.close();
    s.close();
    drop(s);
    assert_eq!(conn.closes(), 1);
}

#[test]
fn test_monitor_ends_one_slice_after_deadline() {
    let conn = ScriptedConnection::default();
    let mut s = session(&conn, quick_config());

    let monitor = ReportMonitor::new(Duration::from_millis(200), 50, None);
    let started = Instant::now();
    let summary = monitor.run(&mut s);
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(200 + 50 + 150), "took {elapsed:?}");
    assert_eq!(summary, MonitorSummary::default());
}

#[test]
fn test_monitor_on_dead_connection_stops_at_deadline() {
    let conn = ScriptedConnection::default();
    conn.0.borrow_mut().peer_closed = true;
    let mut s = session(&conn, quick_config());

    // Slices do not divide the window evenly; the last backoff is cut short.
    let monitor = ReportMonitor::new(Duration::from_millis(1000), 300, None);
    let started = Instant::now();
    let summary = monitor.run(&mut s);
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(1000));
    assert!(elapsed < Duration::from_millis(1300), "took {elapsed:?}");
    assert_eq!(summary, MonitorSummary::default());
}

#[test]
fn test_monitor_sends_polls() {
    let conn = ScriptedConnection::default();
    let mut s = session(&conn, quick_config());

    let monitor = ReportMonitor::new(Duration::from_millis(200), 10, Some(Duration::from_millis(40)));
    let summary = monitor.run(&mut s);
    drop(s);

    assert!(summary.polls_sent >= 2, "{summary:?}");
    let polls = conn
        .sent_types()
        .iter()
        .filter(|t| **t == MessageType::GetReport)
        .count();
    assert_eq!(polls as u32, summary.polls_sent);
}

#[test]
fn test_monitor_classifies_messages() {
    let conn = ScriptedConnection::default();
    conn.push_inbound(sample_report());
    conn.push_inbound(MessageBody::ReaderEventNotification(Some(ReaderEventNotificationData {
        timestamp_us: None,
        events: vec![ReaderEvent::Antenna {
            event_type: 0,
            antenna_id: 2,
        }],
    })));
    conn.push_inbound(MessageBody::ReaderEventNotification(None));
    conn.push_inbound(MessageBody::Keepalive);
    conn.push_inbound(MessageBody::Unknown { type_code: 999 });

    let mut s = session(&conn, quick_config());
    let monitor = ReportMonitor::new(Duration::from_millis(100), 10, None);
    let summary = monitor.run(&mut s);

    assert_eq!(summary.reports, 1);
    assert_eq!(summary.tag_entries, 2);
    assert_eq!(summary.events, 1);
    assert_eq!(summary.unexpected, 1);
    assert_eq!(summary.polls_sent, 0);

    let out = String::from_utf8(s.output().clone()).unwrap();
    assert_eq!(out.lines().filter(|l| l.starts_with("epc=")).count(), 2);
    drop(s);
    assert_eq!(conn.sent_types(), vec![MessageType::KeepaliveAck]);
}

#[test]
fn test_personnel_scenario_polls_by_default() {
    let mut config = quick_config();
    config.operation.scenario = 10;
    let monitor = ReportMonitor::from_config(&config.monitor, Scenario::Personnel);
    assert_eq!(monitor.poll_interval(), Some(Duration::from_secs(10)));

    let streaming = ReportMonitor::from_config(&config.monitor, Scenario::ReadTid);
    assert_eq!(streaming.poll_interval(), None);
}

#[test]
fn test_state_aware_select_scenario_runs_full_sequence() {
    let conn = ScriptedConnection::default();
    conn.push_inbound(connection_ok());
    let mut config = quick_config();
    config.operation.scenario = 11;

    let mut s = session(&conn, config);
    assert_eq!(s.execute(), OUTCOME_SUCCESS);
    drop(s);

    let script = conn.0.borrow();
    let added = script
        .sent
        .iter()
        .find_map(|m| match &m.body {
            MessageBody::AddRoSpec(spec) => Some(spec.clone()),
            _ => None,
        })
        .unwrap();
    let command = &added.ai_spec.inventory[0].antenna_configurations[0].inventory_commands[0];
    assert!(command.state_aware);
    assert_eq!(command.filters.len(), 5);
}

#[test]
fn test_line_capacity_truncates_output() {
    let conn = ScriptedConnection::default();
    let mut config = quick_config();
    config.session.line_capacity = 10;
    let mut s = session(&conn, config);

    if let MessageBody::RoAccessReport(tags) = sample_report() {
        s.print_tag_reports(&tags[..1]);
    }
    let out = String::from_utf8(s.output().clone()).unwrap();
    assert_eq!(out, "epc=AABB-\n");
}
