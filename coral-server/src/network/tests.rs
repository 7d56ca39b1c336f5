use super::{ConnectionLifecycle, ReactorConnection, ServerReactor};
use crate::app::ServerApp;
use coral_common::config::ServerConfig;
use coral_core::command::CommandReply;
use coral_core::wire::{encode_frame, encode_request};
use googletest::prelude::*;
use rstest::rstest;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

fn reply_bytes(replies: &[CommandReply]) -> Vec<u8> {
    let mut out = Vec::new();
    for reply in replies {
        encode_frame(reply, &mut out).expect("test replies fit in a frame");
    }
    out
}

fn bind_reactor(config: ServerConfig) -> (ServerApp, ServerReactor, SocketAddr) {
    let app = ServerApp::new(config);
    let reactor = ServerReactor::bind(SocketAddr::from(([127, 0, 0, 1], 0)), &app.config)
        .expect("reactor bind should succeed");
    let listen_addr = reactor
        .local_addr()
        .expect("local addr should be available");
    (app, reactor, listen_addr)
}

fn connect_nonblocking(addr: SocketAddr) -> TcpStream {
    let client = TcpStream::connect(addr).expect("connect should succeed");
    client
        .set_nonblocking(true)
        .expect("nonblocking client should be configurable");
    client
}

/// Polls the reactor while collecting client bytes until `expected_len` arrive or the
/// deadline passes.
fn pump_until_response(
    reactor: &mut ServerReactor,
    app: &mut ServerApp,
    client: &mut TcpStream,
    expected_len: usize,
) -> Vec<u8> {
    let deadline = Instant::now() + Duration::from_millis(600);
    let mut response = Vec::new();
    while Instant::now() < deadline && response.len() < expected_len {
        let _ = reactor
            .poll_once(app, Some(Duration::from_millis(5)))
            .expect("reactor poll should succeed");

        let mut chunk = [0_u8; 4096];
        match client.read(&mut chunk) {
            Ok(0) => break,
            Ok(read_len) => response.extend_from_slice(&chunk[..read_len]),
            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(error) => panic!("read from client failed: {error}"),
        }
    }
    response
}

#[rstest]
fn reactor_executes_pipelined_set_get_roundtrip() {
    let (mut app, mut reactor, listen_addr) = bind_reactor(ServerConfig::default());
    let mut client = connect_nonblocking(listen_addr);

    let mut request = encode_request(&[b"SET", b"fruit", b"pear"]);
    request.extend_from_slice(&encode_request(&[b"GET", b"fruit"]));
    request.extend_from_slice(&encode_request(&[b"GET", b"missing"]));
    client
        .write_all(&request)
        .expect("write requests should succeed");

    let expected = reply_bytes(&[
        CommandReply::Nil,
        CommandReply::Str(b"pear".to_vec()),
        CommandReply::Nil,
    ]);
    let response = pump_until_response(&mut reactor, &mut app, &mut client, expected.len());
    assert_that!(&response, eq(&expected));
}

#[rstest]
fn reactor_drops_connection_state_after_peer_close() {
    let (mut app, mut reactor, listen_addr) = bind_reactor(ServerConfig::default());
    let client = TcpStream::connect(listen_addr).expect("connect should succeed");
    drop(client);

    let deadline = Instant::now() + Duration::from_millis(600);
    while Instant::now() < deadline {
        let _ = reactor
            .poll_once(&mut app, Some(Duration::from_millis(5)))
            .expect("reactor poll should succeed");
        if reactor.connection_count() == 0 {
            break;
        }
    }

    assert_that!(reactor.connection_count(), eq(0_usize));
}

#[rstest]
fn requests_sent_before_a_write_shutdown_still_get_replies() {
    let (mut app, mut reactor, listen_addr) = bind_reactor(ServerConfig::default());
    let mut client = connect_nonblocking(listen_addr);

    client
        .write_all(&encode_request(&[b"SET", b"fruit", b"pear"]))
        .expect("write request should succeed");
    client
        .shutdown(Shutdown::Write)
        .expect("write-side shutdown should succeed");

    let expected = reply_bytes(&[CommandReply::Nil]);
    let response = pump_until_response(&mut reactor, &mut app, &mut client, expected.len());
    assert_that!(&response, eq(&expected));
    assert_that!(app.store.len(), eq(1));
}

#[rstest]
fn oversized_frame_closes_the_connection_without_a_reply() {
    let config = ServerConfig {
        max_frame_bytes: 128,
        ..ServerConfig::default()
    };
    let (mut app, mut reactor, listen_addr) = bind_reactor(config);
    let mut client = connect_nonblocking(listen_addr);

    client
        .write_all(&(4096_u32).to_le_bytes())
        .expect("write length prefix should succeed");

    let deadline = Instant::now() + Duration::from_millis(600);
    let mut closed_without_reply = false;
    while Instant::now() < deadline {
        let _ = reactor
            .poll_once(&mut app, Some(Duration::from_millis(5)))
            .expect("reactor poll should succeed");
        let mut chunk = [0_u8; 64];
        match client.read(&mut chunk) {
            Ok(0) => {
                closed_without_reply = true;
                break;
            }
            Ok(read_len) => panic!("server wrote {read_len} unexpected bytes"),
            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(error) => panic!("read from client failed: {error}"),
        }
    }

    assert_that!(closed_without_reply, eq(true));
    assert_that!(reactor.connection_count(), eq(0_usize));
}

#[rstest]
fn idle_connections_are_evicted_after_the_timeout() {
    let config = ServerConfig {
        idle_timeout_ms: 40,
        ..ServerConfig::default()
    };
    let (mut app, mut reactor, listen_addr) = bind_reactor(config);
    let _client = connect_nonblocking(listen_addr);

    let deadline = Instant::now() + Duration::from_millis(600);
    while Instant::now() < deadline {
        let _ = reactor
            .poll_once(&mut app, Some(Duration::from_millis(5)))
            .expect("reactor poll should succeed");
        if reactor.connection_count() == 0 {
            break;
        }
    }

    assert_that!(reactor.connection_count(), eq(0_usize));
}

#[rstest]
fn ttl_expiry_runs_from_the_poll_loop() {
    let (mut app, mut reactor, listen_addr) = bind_reactor(ServerConfig::default());
    let mut client = connect_nonblocking(listen_addr);

    let mut request = encode_request(&[b"SET", b"short", b"lived"]);
    request.extend_from_slice(&encode_request(&[b"PEXPIRE", b"short", b"40"]));
    client
        .write_all(&request)
        .expect("write requests should succeed");

    let expected = reply_bytes(&[CommandReply::Nil, CommandReply::Int(1)]);
    let response = pump_until_response(&mut reactor, &mut app, &mut client, expected.len());
    assert_that!(&response, eq(&expected));
    assert_that!(app.store.len(), eq(1));

    let deadline = Instant::now() + Duration::from_millis(1000);
    while Instant::now() < deadline && !app.store.is_empty() {
        let _ = reactor
            .poll_once(&mut app, Some(Duration::from_millis(5)))
            .expect("reactor poll should succeed");
    }
    assert_that!(app.store.is_empty(), eq(true));
}

#[rstest]
fn pending_replies_pause_the_read_side() {
    let mut app = ServerApp::new(ServerConfig::default());
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .expect("listener bind should succeed");
    let listen_addr = listener
        .local_addr()
        .expect("listener must expose local addr");

    let mut client = TcpStream::connect(listen_addr).expect("connect should succeed");
    let (server_stream, _) = listener.accept().expect("accept should succeed");
    server_stream
        .set_nonblocking(true)
        .expect("accepted socket should be nonblocking");

    let mut connection =
        ReactorConnection::new(mio::net::TcpStream::from_std(server_stream), 0);
    client
        .write_all(&encode_request(&[b"GET", b"k"]))
        .expect("client request write should succeed");

    ServerReactor::read_connection_bytes(&mut app, &mut connection);

    assert_that!(connection.lifecycle, eq(ConnectionLifecycle::Active));
    assert_that!(connection.should_try_flush(), eq(true));
    assert_that!(connection.can_read(), eq(false));
}
