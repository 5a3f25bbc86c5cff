//! Session Module
//!
//! The command-level API over one RCON connection.
//!
//! ## Responsibilities
//! - Drive the connection state machine
//! - Authenticate right after connecting
//! - Format commands, submit them through the correlator, parse replies
//! - Publish lifecycle notifications on a single event channel
//! - Run the optional player poller while authenticated
//!
//! ## Threads
//! - Callers: any number, each blocks only on its own command
//! - Receive thread: one per connection, owns the decoding `Framer`
//! - Poller thread: one per authenticated connection, when configured

mod correlator;
mod poller;
mod state;

pub use correlator::{Correlator, Resolution};
pub use poller::Poller;
pub use state::{ConnectionState, SessionEvent};

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{RconError, Result};
use crate::network::{CloseKind, StreamHandler, TcpConnection, Transport};
use crate::protocol::{
    decode_packet, encode_packet, parse_player_list, Command, Framer, Packet, PacketType, Player,
    ServerInfo,
};

/// Events kept for the host before new ones are dropped
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Everything that exists only while a connection is up
struct Link {
    /// Distinguishes this connection from later ones
    generation: u64,

    transport: Arc<TcpConnection>,

    /// Outgoing frames; decoding state lives on the receive thread
    framer: Framer,

    poller: Option<Poller>,
}

struct Inner {
    config: Config,

    state: RwLock<ConnectionState>,

    link: Mutex<Option<Link>>,

    correlator: Correlator,

    server_info: RwLock<ServerInfo>,

    player_count: AtomicUsize,

    next_generation: AtomicU64,

    /// Serializes connect/disconnect cycles
    connect_lock: Mutex<()>,

    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
}

/// An RCON client session
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Create a disconnected session
    pub fn new(config: Config) -> Self {
        let (events_tx, events_rx) = channel::bounded(EVENT_QUEUE_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                config,
                state: RwLock::new(ConnectionState::NotConnected),
                link: Mutex::new(None),
                correlator: Correlator::new(),
                server_info: RwLock::new(ServerInfo::default()),
                player_count: AtomicUsize::new(0),
                next_generation: AtomicU64::new(0),
                connect_lock: Mutex::new(()),
                events_tx,
                events_rx,
            }),
        }
    }

    /// Connect, authenticate and fetch server info once.
    ///
    /// An existing connection is closed first. Fails with the connect error,
    /// `AuthFailure`, or the auth timeout; the session is disconnected in
    /// every failure case.
    pub fn connect(&self) -> Result<()> {
        let _connect_guard = self.inner.connect_lock.lock();
        self.inner.config.validate()?;

        if self.state() != ConnectionState::NotConnected {
            self.inner.teardown(None, CloseKind::Closed, None);
        }

        self.open_transport()?;
        self.authenticate()
    }

    /// Connect, authenticate, ask for server info and disconnect.
    pub fn probe(config: Config) -> Result<ServerInfo> {
        let session = Session::new(config);
        session.connect()?;
        let info = session.info();
        session.disconnect();
        info
    }

    /// Close the connection. Pending commands fail with `TransportLost(Closed)`.
    pub fn disconnect(&self) {
        if self.inner.link.lock().is_some() {
            tracing::info!("Disconnecting from {}", self.inner.config.address());
        }
        self.inner.teardown(None, CloseKind::Closed, None);
    }

    fn open_transport(&self) -> Result<()> {
        let inner = &self.inner;
        let config = &inner.config;

        inner.transition(ConnectionState::Connecting);
        tracing::info!("Connecting to {}", config.address());

        let generation = inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let handler = Inbound {
            framer: Framer::with_max_frame_size(config.max_frame_size),
            session: Arc::downgrade(inner),
            generation,
        };

        // Held until the link is stored so an early close finds it
        let mut link = inner.link.lock();
        match TcpConnection::connect(config, handler) {
            Ok(transport) => {
                *link = Some(Link {
                    generation,
                    transport,
                    framer: Framer::with_max_frame_size(config.max_frame_size),
                    poller: None,
                });
                inner.transition(ConnectionState::Connected);
                drop(link);

                inner.emit(SessionEvent::Connected);
                Ok(())
            }
            Err(e) => {
                drop(link);
                tracing::error!("Unable to connect to {}: {}", config.address(), e);
                inner.transition(ConnectionState::NotConnected);
                inner.emit(SessionEvent::ConnectionFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn authenticate(&self) -> Result<()> {
        let inner = &self.inner;
        inner.transition(ConnectionState::Authenticating);

        let result = self.request(
            Packet::auth(&inner.config.password),
            PacketType::AuthReply,
            inner.config.auth_timeout,
        );

        if let Err(e) = result {
            tracing::error!("Authentication with {} failed: {}", inner.config.address(), e);
            inner.emit(SessionEvent::Authenticated { success: false });
            self.disconnect();
            return Err(e);
        }

        if !inner.transition_from(ConnectionState::Authenticating, ConnectionState::Authenticated) {
            // Torn down while the reply was in flight
            return Err(RconError::NotConnected);
        }
        tracing::info!("Authenticated with {}", inner.config.address());

        if let Err(e) = self.info() {
            tracing::warn!("Could not read server info: {}", e);
        }

        inner.emit(SessionEvent::Authenticated { success: true });
        self.start_poller();

        Ok(())
    }

    fn start_poller(&self) {
        let interval = match self.inner.config.player_poll_interval {
            Some(interval) => interval,
            None => return,
        };

        let weak = Arc::downgrade(&self.inner);
        let spawned = Poller::spawn("rcon-players", interval, move || {
            let session = match weak.upgrade() {
                Some(inner) => Session { inner },
                None => return false,
            };
            if !session.is_authenticated() {
                return false;
            }
            match session.list_players() {
                Ok(players) => session.inner.emit(SessionEvent::PlayersUpdated(players)),
                Err(e) => tracing::warn!("Player refresh failed: {}", e),
            }
            true
        });

        match spawned {
            Ok(poller) => {
                if let Some(link) = self.inner.link.lock().as_mut() {
                    link.poller = Some(poller);
                }
            }
            Err(e) => tracing::warn!("Could not start player poller: {}", e),
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Show a message to every player
    pub fn broadcast(&self, message: &str) -> Result<String> {
        let message = non_blank(message, "broadcast message")?;
        self.execute(Command::Broadcast {
            message: message.to_string(),
        })
    }

    /// Shut the server down after `seconds`
    pub fn shutdown(&self, seconds: u32, message: &str) -> Result<String> {
        self.execute(Command::Shutdown {
            seconds,
            message: message.trim().to_string(),
        })
    }

    /// Save the world
    pub fn save(&self) -> Result<String> {
        self.execute(Command::Save)
    }

    /// Currently connected players; also refreshes `player_count()`
    pub fn list_players(&self) -> Result<Vec<Player>> {
        let body = self.execute(Command::ShowPlayers)?;
        let players = parse_player_list(&body);
        self.inner.player_count.store(players.len(), Ordering::Relaxed);
        Ok(players)
    }

    /// Kick a player by steam id
    pub fn kick(&self, id: &str) -> Result<String> {
        let id = non_blank(id, "player id")?;
        self.execute(Command::KickPlayer { id: id.to_string() })
    }

    /// Ban a player by steam id
    pub fn ban(&self, id: &str) -> Result<String> {
        let id = non_blank(id, "player id")?;
        self.execute(Command::BanPlayer { id: id.to_string() })
    }

    /// Send arbitrary command text
    pub fn raw_command(&self, text: &str) -> Result<String> {
        let text = non_blank(text, "command")?;
        self.execute(Command::Raw(text.to_string()))
    }

    /// Server version and name; also refreshes `server_info()`
    pub fn info(&self) -> Result<ServerInfo> {
        let body = self.execute(Command::Info)?;
        let info = ServerInfo::parse(&body)?;

        *self.inner.server_info.write() = info.clone();
        self.inner.emit(SessionEvent::ServerInfoUpdated(info.clone()));
        Ok(info)
    }

    /// Run a command and return the reply body
    pub fn execute(&self, command: Command) -> Result<String> {
        if !self.state().accepts_commands() {
            return Err(RconError::NotConnected);
        }

        tracing::debug!("Sending command: {}", command);
        let reply = self.request(
            Packet::command(command.body()),
            PacketType::Response,
            self.inner.config.command_timeout,
        )?;
        tracing::trace!("Reply to {:?}: {:?}", command, reply.body);

        Ok(reply.body)
    }

    fn request(&self, packet: Packet, expected: PacketType, timeout: Duration) -> Result<Packet> {
        let (transport, frame) = {
            let link = self.inner.link.lock();
            let link = link.as_ref().ok_or(RconError::NotConnected)?;
            let frame = link.framer.encode(&encode_packet(&packet))?;
            (Arc::clone(&link.transport), frame)
        };

        self.inner
            .correlator
            .submit(transport.as_ref(), &frame, expected, timeout)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == ConnectionState::Authenticated
    }

    /// Last server info read, or the disconnected placeholder
    pub fn server_info(&self) -> ServerInfo {
        self.inner.server_info.read().clone()
    }

    /// Player count from the last `list_players`
    pub fn player_count(&self) -> usize {
        self.inner.player_count.load(Ordering::Relaxed)
    }

    /// Session notifications.
    ///
    /// Every clone of the receiver drains the same queue. At most
    /// `EVENT_QUEUE_CAPACITY` events are held; newer ones are dropped until
    /// the host catches up.
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.inner.events_rx.clone()
    }

    /// Requests sent and still waiting for a reply
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

impl Inner {
    fn transition(&self, next: ConnectionState) {
        let mut state = self.state.write();
        if *state != next {
            tracing::debug!("Session state: {} -> {}", *state, next);
            *state = next;
        }
    }

    /// Move to `next` only if still in `from`
    fn transition_from(&self, from: ConnectionState, next: ConnectionState) -> bool {
        let mut state = self.state.write();
        if *state != from {
            return false;
        }
        tracing::debug!("Session state: {} -> {}", from, next);
        *state = next;
        true
    }

    /// Queue an event. Dropped when the host has let the queue fill up.
    fn emit(&self, event: SessionEvent) {
        if let Err(TrySendError::Full(event)) = self.events_tx.try_send(event) {
            tracing::debug!("Event queue full, dropping {:?}", event);
        }
    }

    /// Tear down the current connection.
    ///
    /// With `generation` set, only that connection is torn down; reports
    /// from an older connection's receive thread are ignored.
    fn teardown(&self, generation: Option<u64>, kind: CloseKind, reason: Option<String>) {
        let link = {
            let mut slot = self.link.lock();
            let current = match slot.as_ref() {
                Some(link) => link.generation,
                None => return,
            };
            if generation.is_some_and(|g| g != current) {
                return;
            }
            // Whoever finds the slot empty also sees NotConnected
            self.transition(ConnectionState::NotConnected);
            slot.take()
        };

        let Some(mut link) = link else { return };

        link.transport.disconnect();
        if let Some(mut poller) = link.poller.take() {
            poller.stop();
        }

        self.correlator.fail_all(kind);
        *self.server_info.write() = ServerInfo::default();
        self.player_count.store(0, Ordering::Relaxed);

        match &reason {
            Some(reason) => tracing::warn!("Connection {}: {}", kind, reason),
            None => tracing::info!("Connection {}", kind),
        }
        self.emit(SessionEvent::Disconnected { kind, reason });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.transport.disconnect();
        }
    }
}

/// Receive side of one connection
struct Inbound {
    framer: Framer,
    session: Weak<Inner>,
    generation: u64,
}

impl StreamHandler for Inbound {
    fn on_data(&mut self, chunk: &[u8]) -> Result<()> {
        let payloads = self.framer.decode(chunk)?;

        let inner = match self.session.upgrade() {
            Some(inner) => inner,
            None => return Ok(()),
        };

        for payload in payloads {
            let packet = match decode_packet(&payload) {
                Ok(packet) => packet,
                Err(e) => {
                    tracing::warn!("Undecodable packet: {}", e);
                    inner.correlator.fail_head(e);
                    continue;
                }
            };

            tracing::trace!(
                "Packet id={} type={:?} body={:?}",
                packet.request_id,
                packet.kind,
                packet.body
            );

            let error = match inner.correlator.resolve(packet) {
                Resolution::Delivered | Resolution::Unsolicited => continue,
                Resolution::AuthRejected => RconError::AuthFailure,
                Resolution::Mismatch { expected, actual } => {
                    RconError::ProtocolMismatch { expected, actual }
                }
            };
            if error.is_fatal() {
                return Err(error);
            }
        }

        Ok(())
    }

    fn on_close(&mut self, kind: CloseKind, reason: Option<String>) {
        if let Some(inner) = self.session.upgrade() {
            inner.teardown(Some(self.generation), kind, reason);
        }
    }
}

fn non_blank<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RconError::InvalidCommand(format!("{} is empty", what)));
    }
    Ok(trimmed)
}
