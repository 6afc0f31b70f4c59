//! Cross-module protocol-sequencing tests: a fake in-memory duplex stream
//! plays the server side of the handshake and drives the state machine
//! through its phase transitions without a real socket.

use tokio::io::duplex;

use crate::buffer::WriteMessageBuffer;
use crate::codec::value::Value;
use crate::connection::{Connection, Phase};
use crate::error::{Error, ProtocolError};
use crate::protocol::constants::{auth_status, server_tag, PROTOCOL_VERSION_MAJOR, PROTOCOL_VERSION_MINOR};

fn write_headers_empty(buf: &mut WriteMessageBuffer) {
    buf.write_u16(0).unwrap();
}

fn server_handshake_frame(buf: &mut WriteMessageBuffer) {
    buf.begin_message(server_tag::SERVER_HANDSHAKE).unwrap();
    buf.write_u16(PROTOCOL_VERSION_MAJOR).unwrap();
    buf.write_u16(PROTOCOL_VERSION_MINOR).unwrap();
    write_headers_empty(buf);
    buf.end_message().unwrap();
}

fn authentication_ok_frame(buf: &mut WriteMessageBuffer) {
    buf.begin_message(server_tag::AUTHENTICATION).unwrap();
    buf.write_u32(auth_status::OK).unwrap();
    buf.end_message().unwrap();
}

fn ready_for_command_frame(buf: &mut WriteMessageBuffer) {
    buf.begin_message(server_tag::READY_FOR_COMMAND).unwrap();
    write_headers_empty(buf);
    buf.write_u8(b'I').unwrap();
    buf.end_message().unwrap();
}

fn error_response_frame(buf: &mut WriteMessageBuffer, code: u32, message: &str) {
    buf.begin_message(server_tag::ERROR_RESPONSE).unwrap();
    buf.write_u8(0).unwrap(); // severity
    buf.write_u32(code).unwrap();
    buf.write_string(message).unwrap();
    write_headers_empty(buf); // attributes
    buf.end_message().unwrap();
}

fn parameter_status_frame(buf: &mut WriteMessageBuffer, name: &str, value: &[u8]) {
    buf.begin_message(server_tag::PARAMETER_STATUS).unwrap();
    buf.write_string(name).unwrap();
    buf.write_i32(value.len() as i32).unwrap();
    buf.write_bytes(value).unwrap();
    buf.end_message().unwrap();
}

#[test]
fn new_connection_starts_in_tcp_connected_phase() {
    let (client, _server) = duplex(4096);
    let conn = Connection::new(client);
    assert_eq!(conn.phase(), Phase::TcpConnected);
}

#[tokio::test]
async fn handshake_succeeds_and_reaches_ready() {
    let (client, mut server) = duplex(4096);
    let mut conn = Connection::new(client);

    let mut frames = WriteMessageBuffer::new();
    server_handshake_frame(&mut frames);
    authentication_ok_frame(&mut frames);
    ready_for_command_frame(&mut frames);
    let bytes = frames.unwrap().unwrap();

    let writer = tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        server.write_all(&bytes).await.unwrap();
        server
    });

    conn.handshake("user", "db").await.unwrap();
    writer.await.unwrap();

    assert_eq!(conn.phase(), Phase::Ready);
}

#[tokio::test]
async fn handshake_error_response_closes_the_connection() {
    let (client, mut server) = duplex(4096);
    let mut conn = Connection::new(client);

    let mut frames = WriteMessageBuffer::new();
    error_response_frame(&mut frames, 42, "bad credentials");
    let bytes = frames.unwrap().unwrap();

    tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        server.write_all(&bytes).await.unwrap();
    });

    let err = conn.handshake("user", "db").await.unwrap_err();
    assert!(matches!(err, Error::Server(_)));
    assert_eq!(conn.phase(), Phase::Closed);
}

#[tokio::test]
async fn handshake_absorbs_parameter_status_before_ready() {
    let (client, mut server) = duplex(4096);
    let mut conn = Connection::new(client);

    let mut frames = WriteMessageBuffer::new();
    parameter_status_frame(&mut frames, "pgversion", b"14.2");
    server_handshake_frame(&mut frames);
    authentication_ok_frame(&mut frames);
    ready_for_command_frame(&mut frames);
    let bytes = frames.unwrap().unwrap();

    tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        server.write_all(&bytes).await.unwrap();
    });

    conn.handshake("user", "db").await.unwrap();
    assert_eq!(
        conn.server_settings().get("pgversion").map(Vec::as_slice),
        Some(b"14.2".as_slice())
    );
}

#[tokio::test]
async fn query_before_handshake_rejected_without_touching_the_transport() {
    let (client, _server) = duplex(64);
    let mut conn = Connection::new(client);

    let err = conn
        .query("select 1", false, false, &Value::Tuple(Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol(ProtocolError::WrongPhase { expected: "Ready", .. })
    ));
    assert_eq!(conn.phase(), Phase::TcpConnected);
}

#[tokio::test]
async fn handshake_when_not_tcp_connected_is_rejected() {
    let (client, mut server) = duplex(4096);
    let mut conn = Connection::new(client);

    let mut frames = WriteMessageBuffer::new();
    server_handshake_frame(&mut frames);
    authentication_ok_frame(&mut frames);
    ready_for_command_frame(&mut frames);
    let bytes = frames.unwrap().unwrap();
    tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        server.write_all(&bytes).await.unwrap();
    });
    conn.handshake("user", "db").await.unwrap();

    let err = conn.handshake("user", "db").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol(ProtocolError::WrongPhase { expected: "TcpConnected", .. })
    ));
}
