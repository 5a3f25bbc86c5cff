//! TCP Connection Tests
//!
//! Tests for connect, send, the receive loop, and close reporting.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};
use palrcon::network::{CloseKind, StreamHandler, TcpConnection, Transport};
use palrcon::{Config, RconError, Result};

// =============================================================================
// Helper Functions
// =============================================================================

#[derive(Debug, PartialEq)]
enum Seen {
    Data(Vec<u8>),
    Close(CloseKind, Option<String>),
}

/// Handler forwarding everything to a channel
struct ChannelHandler {
    tx: Sender<Seen>,
    fail_on_data: bool,
}

impl StreamHandler for ChannelHandler {
    fn on_data(&mut self, chunk: &[u8]) -> Result<()> {
        if self.fail_on_data {
            return Err(RconError::Protocol("refusing data".to_string()));
        }
        let _ = self.tx.send(Seen::Data(chunk.to_vec()));
        Ok(())
    }

    fn on_close(&mut self, kind: CloseKind, reason: Option<String>) {
        let _ = self.tx.send(Seen::Close(kind, reason));
    }
}

fn handler(fail_on_data: bool) -> (ChannelHandler, Receiver<Seen>) {
    let (tx, rx) = unbounded();
    (ChannelHandler { tx, fail_on_data }, rx)
}

fn config_for(port: u16) -> Config {
    Config::builder()
        .host("127.0.0.1")
        .port(port)
        .connect_timeout(Duration::from_secs(2))
        .build()
}

/// Wait for the close report, collecting data seen before it
fn wait_for_close(rx: &Receiver<Seen>) -> (Vec<u8>, CloseKind, Option<String>) {
    let mut data = Vec::new();
    loop {
        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Seen::Data(chunk)) => data.extend(chunk),
            Ok(Seen::Close(kind, reason)) => return (data, kind, reason),
            Err(e) => panic!("no close report: {}", e),
        }
    }
}

// =============================================================================
// Data Tests
// =============================================================================

#[test]
fn test_send_and_receive() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (handler, rx) = handler(false);

    let connection = TcpConnection::connect(&config_for(port), handler).unwrap();
    let (mut server, _) = listener.accept().unwrap();

    assert!(connection.is_connected());
    assert!(connection.peer_addr().starts_with("127.0.0.1:"));

    connection.send(b"ping").unwrap();
    let mut buf = [0u8; 4];
    server.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"ping");

    server.write_all(b"pong").unwrap();
    drop(server);

    let (data, kind, reason) = wait_for_close(&rx);
    assert_eq!(data, b"pong");
    assert_eq!(kind, CloseKind::Disconnected);
    assert!(reason.is_none());
    assert!(!connection.is_connected());
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_local_disconnect_reports_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (handler, rx) = handler(false);

    let connection = TcpConnection::connect(&config_for(port), handler).unwrap();
    let _server = listener.accept().unwrap();

    connection.disconnect();
    connection.disconnect();

    let (_, kind, _) = wait_for_close(&rx);
    assert_eq!(kind, CloseKind::Closed);
    assert!(matches!(connection.send(b"late"), Err(RconError::NotConnected)));
    // Exactly one close report
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn test_handler_error_reports_lost() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (handler, rx) = handler(true);

    let connection = TcpConnection::connect(&config_for(port), handler).unwrap();
    let (mut server, _) = listener.accept().unwrap();
    server.write_all(b"anything").unwrap();

    let (data, kind, reason) = wait_for_close(&rx);
    assert!(data.is_empty());
    assert_eq!(kind, CloseKind::Lost);
    assert!(reason.unwrap().contains("refusing data"));
    assert!(!connection.is_connected());
}

// =============================================================================
// Connect Tests
// =============================================================================

#[test]
fn test_connect_refused() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let (handler, rx) = handler(false);

    let result = TcpConnection::connect(&config_for(port), handler);

    assert!(matches!(result, Err(RconError::Connection(_))));
    // No receive loop was started
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}
