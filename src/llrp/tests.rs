//! Connection tests against an in-process fake reader.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use super::*;

/// Read one frame from the client side of the socket.
fn read_client_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; 10];
    stream.read_exact(&mut header).unwrap();
    let len = u32::from_be_bytes([header[2], header[3], header[4], header[5]]) as usize;
    let mut frame = header.to_vec();
    frame.resize(len, 0);
    stream.read_exact(&mut frame[10..]).unwrap();
    frame
}

fn send(stream: &mut TcpStream, msg: &Message) {
    stream.write_all(&encode_message(msg).unwrap()).unwrap();
}

/// Start a fake reader running `script` on the accepted socket.
fn fake_reader<F>(script: F) -> (TcpConnection, thread::JoinHandle<()>)
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        script(stream);
    });
    let mut conn = TcpConnection::new("127.0.0.1", port, Duration::from_secs(2), 32 * 1024).unwrap();
    conn.open().unwrap();
    (conn, handle)
}

fn connection_event(id: u32, status: u16) -> Message {
    Message::new(
        id,
        MessageBody::ReaderEventNotification(Some(ReaderEventNotificationData {
            timestamp_us: Some(1_700_000_000_000_000),
            events: vec![ReaderEvent::ConnectionAttempt { status }],
        })),
    )
}

#[test]
fn test_recv_connection_event() {
    let (mut conn, handle) = fake_reader(|mut s| {
        send(&mut s, &connection_event(0, CONNECTION_ATTEMPT_SUCCESS));
        thread::sleep(Duration::from_millis(100));
    });

    let msg = conn.recv(RecvWait::Millis(2000)).unwrap();
    let MessageBody::ReaderEventNotification(Some(data)) = &msg.body else {
        panic!("unexpected message {msg:?}");
    };
    assert_eq!(data.connection_attempt(), Some(CONNECTION_ATTEMPT_SUCCESS));
    conn.close().unwrap();
    handle.join().unwrap();
}

#[test]
fn test_recv_times_out_without_traffic() {
    let (mut conn, handle) = fake_reader(|_s| thread::sleep(Duration::from_millis(300)));

    let start = Instant::now();
    let err = conn.recv(RecvWait::Millis(50)).unwrap_err();
    assert!(err.is_recv_timeout());
    assert!(start.elapsed() < Duration::from_millis(250));
    handle.join().unwrap();
}

#[test]
fn test_stalled_frame_honours_receive_window() {
    let (mut conn, handle) = fake_reader(|mut s| {
        let frame = encode_message(&connection_event(0, CONNECTION_ATTEMPT_SUCCESS)).unwrap();
        s.write_all(&frame[..1]).unwrap();
        thread::sleep(Duration::from_millis(600));
        s.write_all(&frame[1..]).unwrap();
        thread::sleep(Duration::from_millis(100));
    });

    let start = Instant::now();
    let err = conn.recv(RecvWait::Millis(100)).unwrap_err();
    assert!(err.is_recv_timeout());
    assert!(start.elapsed() < Duration::from_millis(400), "took {:?}", start.elapsed());

    // The buffered first byte is kept; the next receive completes the frame.
    let msg = conn.recv(RecvWait::Millis(2000)).unwrap();
    assert_eq!(msg.message_type(), MessageType::ReaderEventNotification);
    handle.join().unwrap();
}

#[test]
fn test_transact_queues_unrelated_messages() {
    let (mut conn, handle) = fake_reader(|mut s| {
        let frame = read_client_frame(&mut s);
        let (kind, id) = peek_header(&frame).unwrap();
        assert_eq!(kind, MessageType::EnableRoSpec);
        // A report sneaks in before the response.
        send(&mut s, &Message::new(900, MessageBody::RoAccessReport(Vec::new())));
        send(
            &mut s,
            &Message::response(id, MessageType::EnableRoSpecResponse, Some(LlrpStatus::success())),
        );
        thread::sleep(Duration::from_millis(100));
    });

    let cmd = Message::new(5, MessageBody::EnableRoSpec { rospec_id: 1111 });
    let reply = conn.transact(&cmd, Duration::from_secs(2)).unwrap();
    assert_eq!(reply.message_type(), MessageType::EnableRoSpecResponse);
    assert_eq!(reply.id, 5);

    let queued = conn.recv(RecvWait::Poll).unwrap();
    assert_eq!(queued.message_type(), MessageType::RoAccessReport);
    handle.join().unwrap();
}

#[test]
fn test_transact_accepts_error_message() {
    let (mut conn, handle) = fake_reader(|mut s| {
        let frame = read_client_frame(&mut s);
        let (_, id) = peek_header(&frame).unwrap();
        send(
            &mut s,
            &Message::new(
                id,
                MessageBody::ErrorMessage {
                    status: Some(LlrpStatus::failure(100, Some("unsupported message"))),
                },
            ),
        );
        thread::sleep(Duration::from_millis(100));
    });

    let cmd = Message::new(2, MessageBody::ImpinjEnableExtensions);
    let reply = conn.transact(&cmd, Duration::from_secs(2)).unwrap();
    assert_eq!(reply.message_type(), MessageType::ErrorMessage);
    handle.join().unwrap();
}

#[test]
fn test_transact_timeout_names_expected_type() {
    let (mut conn, handle) = fake_reader(|mut s| {
        let _ = read_client_frame(&mut s);
        thread::sleep(Duration::from_millis(400));
    });

    let cmd = Message::new(1, MessageBody::StopRoSpec { rospec_id: 1111 });
    let err = conn.transact(&cmd, Duration::from_millis(100)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.ref_type, Some("STOP_ROSPEC_RESPONSE"));
    handle.join().unwrap();
}

#[test]
fn test_peer_close_is_reported() {
    let (mut conn, handle) = fake_reader(drop);
    handle.join().unwrap();
    let err = conn.recv(RecvWait::Millis(500)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Closed);
}

#[test]
fn test_send_requires_open_connection() {
    let mut conn = TcpConnection::new("127.0.0.1", DEFAULT_PORT, Duration::from_secs(1), 1024).unwrap();
    let err = conn.send(&Message::new(1, MessageBody::GetReport)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotConnected);
    // Closing a never-opened connection is harmless.
    conn.close().unwrap();
}

#[test]
fn test_unresolvable_host() {
    let err = TcpConnection::new("no-such-reader.invalid", DEFAULT_PORT, Duration::from_secs(1), 1024).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Connect);
}

#[test]
fn test_recv_wait_from_millis() {
    assert_eq!(RecvWait::from(0), RecvWait::Poll);
    assert_eq!(RecvWait::from(-1), RecvWait::Forever);
    assert_eq!(RecvWait::from(1000), RecvWait::Millis(1000));
}

#[test]
fn test_message_type_categories() {
    assert_eq!(MessageType::AddRoSpec.category(), Category::Command);
    assert_eq!(MessageType::GetReport.category(), Category::Command);
    assert_eq!(MessageType::AddRoSpecResponse.category(), Category::Response);
    assert_eq!(MessageType::RoAccessReport.category(), Category::Notification);
    assert_eq!(MessageType::ErrorMessage.category(), Category::ErrorReply);
    assert_eq!(
        MessageType::ImpinjEnableExtensions.response_type(),
        Some(MessageType::ImpinjEnableExtensionsResponse)
    );
}

#[test]
fn test_capabilities_decode() {
    let msg = Message::new(
        4,
        MessageBody::Capabilities {
            status: Some(LlrpStatus::success()),
            general: Some(GeneralDeviceCapabilities {
                max_antennas: 4,
                can_set_antenna_properties: false,
                has_utc_clock: true,
                manufacturer: IMPINJ_VENDOR_ID,
                model: 2001002,
                firmware_version: "5.12.1.240".to_string(),
            }),
        },
    );
    let decoded = decode_message(&encode_message(&msg).unwrap()).unwrap();
    assert_eq!(decoded, msg);
}
