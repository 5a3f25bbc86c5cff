//! Tests for Session
//!
//! These tests verify, against a scripted local server:
//! - Connect + auth handshake and the eager info fetch
//! - Auth rejection and connect failures
//! - Command formatting and reply parsing
//! - Pipelining, timeouts, ordering violations and disconnects
//! - The background player poller

mod fake_server;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use palrcon::session::EVENT_QUEUE_CAPACITY;
use palrcon::{CloseKind, Config, ConnectionState, Player, RconError, ServerInfo, Session, SessionEvent};

use fake_server::{closed_port, echo, standard_reply, FakeServer, Incoming, Reply, AUTH_REPLY, PASSWORD, RESPONSE};

// =============================================================================
// Helper Functions
// =============================================================================

fn config_for(port: u16) -> Config {
    Config::builder()
        .host("127.0.0.1")
        .port(port)
        .password(PASSWORD)
        .connect_timeout(Duration::from_secs(2))
        .command_timeout(Duration::from_secs(5))
        .auth_timeout(Duration::from_secs(5))
        .build()
}

fn connected_session(server: &FakeServer) -> Session {
    let session = Session::new(config_for(server.port));
    session.connect().unwrap();
    session
}

/// Wait for the first event matching `pred`, skipping others
fn wait_for(events: &Receiver<SessionEvent>, pred: impl Fn(&SessionEvent) -> bool) -> SessionEvent {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = events
            .recv_timeout(remaining)
            .expect("timed out waiting for session event");
        if pred(&event) {
            return event;
        }
    }
}

fn wait_until(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

// =============================================================================
// Connect / Auth Tests
// =============================================================================

#[test]
fn test_connect_authenticates_and_reads_info() {
    let server = FakeServer::echoing();
    let session = connected_session(&server);

    assert_eq!(session.state(), ConnectionState::Authenticated);
    assert!(session.is_authenticated());
    assert_eq!(session.server_info(), ServerInfo::new("v0.1.5.0", "MyPalServer"));

    let events = session.events();
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Connected);
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::ServerInfoUpdated(ServerInfo::new("v0.1.5.0", "MyPalServer"))
    );
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Authenticated { success: true });

    session.disconnect();
    let seen = server.join();

    assert_eq!(seen[0].kind, fake_server::AUTH);
    assert_eq!(seen[0].body, PASSWORD);
    assert_eq!(seen[1].body, "info");
    assert_eq!(seen[1].kind, RESPONSE);
    assert_eq!(seen[1].id, 0);
}

#[test]
fn test_wrong_password_fails_and_disconnects() {
    let server = FakeServer::echoing();
    let mut config = config_for(server.port);
    config.password = "wrong".to_string();

    let session = Session::new(config);
    let result = session.connect();

    assert!(matches!(result, Err(RconError::AuthFailure)));
    assert_eq!(session.state(), ConnectionState::NotConnected);

    // The receive thread and the failed handshake both close the link;
    // either may report first
    let events = session.events();
    let mut seen = Vec::new();
    while !(seen.contains(&SessionEvent::Authenticated { success: false })
        && seen.iter().any(|e| matches!(e, SessionEvent::Disconnected { .. })))
    {
        seen.push(
            events
                .recv_timeout(Duration::from_secs(5))
                .expect("timed out waiting for session event"),
        );
    }
    let disconnects = seen
        .iter()
        .chain(events.try_iter().collect::<Vec<_>>().iter())
        .filter(|e| matches!(e, SessionEvent::Disconnected { .. }))
        .count();
    assert_eq!(disconnects, 1);

    server.join();
}

#[test]
fn test_connect_refused_reports_failure() {
    let session = Session::new(config_for(closed_port()));

    let result = session.connect();

    assert!(matches!(result, Err(RconError::Connection(_))));
    assert_eq!(session.state(), ConnectionState::NotConnected);
    let event = wait_for(&session.events(), |e| matches!(e, SessionEvent::ConnectionFailed { .. }));
    match event {
        SessionEvent::ConnectionFailed { reason } => assert!(!reason.is_empty()),
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_auth_timeout_disconnects() {
    let server = FakeServer::spawn(1, |_| Reply::Ignore);
    let mut config = config_for(server.port);
    config.auth_timeout = Duration::from_millis(200);

    let session = Session::new(config);
    let result = session.connect();

    assert!(matches!(result, Err(RconError::CommandTimeout(_))));
    assert_eq!(session.state(), ConnectionState::NotConnected);
    assert_eq!(session.pending_requests(), 0);

    server.join();
}

#[test]
fn test_invalid_config_rejected() {
    let session = Session::new(Config::builder().host("").build());

    assert!(matches!(session.connect(), Err(RconError::Config(_))));
}

#[test]
fn test_reconnect_uses_fresh_connection() {
    let server = FakeServer::spawn(2, echo);
    let session = Session::new(config_for(server.port));

    session.connect().unwrap();
    assert_eq!(session.raw_command("first").unwrap(), "ok: first");

    session.connect().unwrap();
    assert_eq!(session.raw_command("second").unwrap(), "ok: second");

    session.disconnect();
    let seen = server.join();
    let auths = seen.iter().filter(|p| p.kind == fake_server::AUTH).count();
    assert_eq!(auths, 2);
}

#[test]
fn test_probe_returns_info() {
    let server = FakeServer::echoing();

    let info = Session::probe(config_for(server.port)).unwrap();

    assert_eq!(info, ServerInfo::new("v0.1.5.0", "MyPalServer"));
    server.join();
}

// =============================================================================
// Command Tests
// =============================================================================

#[test]
fn test_commands_require_authentication() {
    let session = Session::new(config_for(closed_port()));

    assert!(matches!(session.save(), Err(RconError::NotConnected)));
    assert!(matches!(session.info(), Err(RconError::NotConnected)));
    assert!(matches!(session.list_players(), Err(RconError::NotConnected)));
    assert!(matches!(session.broadcast("hi"), Err(RconError::NotConnected)));
}

#[test]
fn test_command_text_on_the_wire() {
    let server = FakeServer::echoing();
    let session = connected_session(&server);

    assert_eq!(session.broadcast("hello world").unwrap(), "ok: Broadcast hello world");
    assert_eq!(session.shutdown(30, "bye").unwrap(), "ok: Shutdown 30 bye");
    assert_eq!(session.save().unwrap(), "ok: Save");
    assert_eq!(session.kick("7656110").unwrap(), "ok: KickPlayer 7656110");
    assert_eq!(session.ban("7656220").unwrap(), "ok: BanPlayer 7656220");
    assert_eq!(session.raw_command("DoExit").unwrap(), "ok: DoExit");

    session.disconnect();
    server.join();
}

#[test]
fn test_blank_arguments_rejected_before_sending() {
    let server = FakeServer::echoing();
    let session = connected_session(&server);

    assert!(matches!(session.broadcast("   "), Err(RconError::InvalidCommand(_))));
    assert!(matches!(session.kick(""), Err(RconError::InvalidCommand(_))));
    assert!(matches!(session.ban(" "), Err(RconError::InvalidCommand(_))));
    assert!(matches!(session.raw_command(""), Err(RconError::InvalidCommand(_))));

    session.disconnect();
    let seen = server.join();
    // auth + info only
    assert_eq!(seen.len(), 2);
}

#[test]
fn test_list_players() {
    let server = FakeServer::echoing();
    let session = connected_session(&server);

    let players = session.list_players().unwrap();

    assert_eq!(
        players,
        vec![
            Player::new("Alice", "1001", "7656110"),
            Player::new("Bob", "1002", "7656220"),
        ]
    );
    assert_eq!(session.player_count(), 2);

    session.disconnect();
    assert_eq!(session.player_count(), 0);
    assert_eq!(session.server_info(), ServerInfo::default());
    server.join();
}

#[test]
fn test_info_updates_cached_metadata() {
    let server = FakeServer::spawn(1, |packet| {
        if packet.body == "info" {
            return Reply::Send(vec![(0, RESPONSE, "[v0.2.0.6] Renamed".to_string())]);
        }
        echo(packet)
    });
    let session = connected_session(&server);

    assert_eq!(session.server_info(), ServerInfo::new("v0.2.0.6", "Renamed"));
    let info = session.info().unwrap();
    assert_eq!(info.name, "Renamed");

    session.disconnect();
    server.join();
}

#[test]
fn test_unparseable_info_does_not_block_auth() {
    let server = FakeServer::spawn(1, |packet| {
        if packet.body == "info" {
            return Reply::Send(vec![(0, RESPONSE, "Unknown command".to_string())]);
        }
        echo(packet)
    });
    let session = connected_session(&server);

    assert!(session.is_authenticated());
    assert_eq!(session.server_info(), ServerInfo::default());
    assert!(matches!(session.info(), Err(RconError::UnexpectedReply(_))));

    session.disconnect();
    server.join();
}

// =============================================================================
// Ordering / Timeout Tests
// =============================================================================

#[test]
fn test_concurrent_commands_get_their_own_replies() {
    let server = FakeServer::echoing();
    let session = connected_session(&server);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let session = session.clone();
            thread::spawn(move || {
                for j in 0..10 {
                    let command = format!("echo {}-{}", i, j);
                    let reply = session.raw_command(&command).unwrap();
                    assert_eq!(reply, format!("ok: {}", command));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(session.pending_requests(), 0);

    session.disconnect();
    server.join();
}

#[test]
fn test_timeout_does_not_misalign_later_requests() {
    let server = FakeServer::spawn(1, |packet| {
        if packet.body == "slow" {
            return Reply::Ignore;
        }
        echo(packet)
    });
    let mut config = config_for(server.port);
    config.command_timeout = Duration::from_millis(200);
    let session = Session::new(config);
    session.connect().unwrap();

    let result = session.raw_command("slow");
    assert!(matches!(result, Err(RconError::CommandTimeout(_))));
    assert_eq!(session.pending_requests(), 0);
    assert!(session.is_authenticated());

    assert_eq!(session.raw_command("fast").unwrap(), "ok: fast");
    assert_eq!(session.save().unwrap(), "ok: Save");

    session.disconnect();
    server.join();
}

#[test]
fn test_reply_type_mismatch_drops_connection() {
    let server = FakeServer::spawn(1, |packet| {
        if packet.body == "confuse" {
            return Reply::Send(vec![(0, AUTH_REPLY, String::new())]);
        }
        echo(packet)
    });
    let session = connected_session(&server);
    let events = session.events();

    let result = session.raw_command("confuse");

    assert!(matches!(
        result,
        Err(RconError::ProtocolMismatch {
            expected: palrcon::protocol::PacketType::Response,
            actual: palrcon::protocol::PacketType::AuthReply,
        })
    ));
    let event = wait_for(&events, |e| matches!(e, SessionEvent::Disconnected { .. }));
    assert!(matches!(
        event,
        SessionEvent::Disconnected {
            kind: CloseKind::Lost,
            reason: Some(_)
        }
    ));
    assert_eq!(session.state(), ConnectionState::NotConnected);
    server.join();
}

#[test]
fn test_auth_failure_sentinel_mid_session() {
    let server = FakeServer::spawn(1, |packet| {
        if packet.body == "kicked" {
            return Reply::Send(vec![(-1, AUTH_REPLY, String::new())]);
        }
        echo(packet)
    });
    let session = connected_session(&server);
    let events = session.events();

    let result = session.raw_command("kicked");

    assert!(matches!(result, Err(RconError::AuthFailure)));
    let event = wait_for(&events, |e| matches!(e, SessionEvent::Disconnected { .. }));
    assert!(matches!(
        event,
        SessionEvent::Disconnected {
            kind: CloseKind::Lost,
            reason: Some(_)
        }
    ));
    assert_eq!(session.state(), ConnectionState::NotConnected);
    assert!(matches!(session.save(), Err(RconError::NotConnected)));
    server.join();
}

#[test]
fn test_event_queue_stays_bounded() {
    let server = FakeServer::echoing();
    let session = connected_session(&server);
    let events = session.events();

    // Nobody drains the queue; every info() call publishes an update
    for _ in 0..EVENT_QUEUE_CAPACITY + 50 {
        session.info().unwrap();
    }

    assert_eq!(events.len(), EVENT_QUEUE_CAPACITY);
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Connected);

    // Room again once the host catches up
    let drained = events.try_iter().count();
    assert_eq!(drained, EVENT_QUEUE_CAPACITY - 1);
    session.info().unwrap();
    assert!(matches!(
        events.try_recv().unwrap(),
        SessionEvent::ServerInfoUpdated(_)
    ));

    session.disconnect();
    server.join();
}

// =============================================================================
// Disconnect Tests
// =============================================================================

#[test]
fn test_server_close_fails_pending_request() {
    let server = FakeServer::spawn(1, |packet| {
        if packet.body == "bye" {
            return Reply::Close;
        }
        echo(packet)
    });
    let session = connected_session(&server);
    let events = session.events();

    let result = session.raw_command("bye");

    assert!(matches!(
        result,
        Err(RconError::TransportLost(CloseKind::Disconnected))
    ));
    wait_for(&events, |e| {
        *e == SessionEvent::Disconnected {
            kind: CloseKind::Disconnected,
            reason: None,
        }
    });
    assert_eq!(session.state(), ConnectionState::NotConnected);
    assert!(matches!(session.save(), Err(RconError::NotConnected)));
    server.join();
}

#[test]
fn test_invalid_frame_length_drops_connection() {
    let server = FakeServer::spawn(1, |packet| {
        if packet.body == "garbage" {
            return Reply::Bytes((-5i32).to_le_bytes().to_vec());
        }
        echo(packet)
    });
    let session = connected_session(&server);
    let events = session.events();

    let result = session.raw_command("garbage");

    assert!(matches!(result, Err(RconError::TransportLost(CloseKind::Lost))));
    let event = wait_for(&events, |e| matches!(e, SessionEvent::Disconnected { .. }));
    match event {
        SessionEvent::Disconnected { kind, reason } => {
            assert_eq!(kind, CloseKind::Lost);
            assert!(reason.unwrap().contains("Invalid frame length"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    server.join();
}

#[test]
fn test_local_disconnect_fails_pending_request() {
    let server = FakeServer::spawn(1, |packet| {
        if packet.body == "hang" {
            return Reply::Ignore;
        }
        echo(packet)
    });
    let session = connected_session(&server);

    let waiter = {
        let session = session.clone();
        thread::spawn(move || session.raw_command("hang"))
    };
    wait_until(|| session.pending_requests() == 1);

    session.disconnect();

    let result = waiter.join().unwrap();
    assert!(matches!(result, Err(RconError::TransportLost(CloseKind::Closed))));
    assert_eq!(session.pending_requests(), 0);
    server.join();
}

#[test]
fn test_oversized_command_is_not_sent() {
    let server = FakeServer::echoing();
    let mut config = config_for(server.port);
    config.max_frame_size = 64;
    let session = Session::new(config);
    session.connect().unwrap();

    let result = session.raw_command(&"x".repeat(100));

    assert!(matches!(result, Err(RconError::FrameTooLarge { .. })));
    assert_eq!(session.pending_requests(), 0);
    assert_eq!(session.raw_command("small").unwrap(), "ok: small");

    session.disconnect();
    let seen = server.join();
    assert!(seen.iter().all(|p| p.body.len() < 100));
}

// =============================================================================
// Player Poller Tests
// =============================================================================

#[test]
fn test_poller_publishes_players_and_stops_on_disconnect() {
    let polls = Arc::new(AtomicBool::new(false));
    let polls_seen = Arc::clone(&polls);
    let server = FakeServer::spawn(1, move |packet: &Incoming| {
        if packet.body == "ShowPlayers" {
            polls_seen.store(true, Ordering::SeqCst);
        }
        standard_reply(packet).unwrap_or(Reply::Ignore)
    });
    let config = Config {
        player_poll_interval: Some(Duration::from_millis(50)),
        ..config_for(server.port)
    };
    let session = Session::new(config);
    session.connect().unwrap();
    let events = session.events();

    let event = wait_for(&events, |e| matches!(e, SessionEvent::PlayersUpdated(_)));
    match event {
        SessionEvent::PlayersUpdated(players) => assert_eq!(players.len(), 2),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(polls.load(Ordering::SeqCst));

    session.disconnect();
    wait_for(&events, |e| matches!(e, SessionEvent::Disconnected { .. }));
    let seen = server.join();
    let polled = seen.iter().filter(|p| p.body == "ShowPlayers").count();
    assert!(polled >= 1);

    // A tick already past its reply may still land, nothing after that
    thread::sleep(Duration::from_millis(300));
    let late = events
        .try_iter()
        .filter(|e| matches!(e, SessionEvent::PlayersUpdated(_)))
        .count();
    assert!(late <= 1);
    assert_eq!(session.state(), ConnectionState::NotConnected);
}
