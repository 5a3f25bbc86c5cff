//! TCP Connection
//!
//! Owns the socket of one session: connect, send, and the receive loop.

use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{RconError, Result};
use super::{CloseKind, StreamHandler, Transport};

/// A connected TCP socket with a dedicated receive thread
pub struct TcpConnection {
    /// Serializes writers so frames never interleave
    writer: Mutex<TcpStream>,

    /// Handle used to shut the socket down without waiting on `writer`
    socket: TcpStream,

    connected: AtomicBool,

    /// Set by `disconnect()` so the read loop reports `Closed`
    closing: AtomicBool,

    /// Peer address for logging
    peer_addr: String,
}

impl TcpConnection {
    /// Connect to `config.host:config.port` and start the receive loop.
    ///
    /// Every resolved address is tried in turn with `config.connect_timeout`.
    /// Bytes read from the socket go to `handler` on the receive thread.
    pub fn connect<H: StreamHandler>(config: &Config, handler: H) -> Result<Arc<Self>> {
        let addrs = resolve(&config.host, config.port)?;

        let mut last_error = None;
        let mut stream = None;
        for addr in &addrs {
            match TcpStream::connect_timeout(addr, config.connect_timeout) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        let stream = match stream {
            Some(s) => s,
            None => {
                let cause = last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no address to try".to_string());
                return Err(RconError::Connection(format!(
                    "Failed to connect to {}: {}",
                    config.address(),
                    cause
                )));
            }
        };

        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Commands are tiny, don't let Nagle hold them back
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(config.command_timeout))?;

        let reader = stream.try_clone()?;
        let socket = stream.try_clone()?;

        let connection = Arc::new(Self {
            writer: Mutex::new(stream),
            socket,
            connected: AtomicBool::new(true),
            closing: AtomicBool::new(false),
            peer_addr,
        });

        let loop_connection = Arc::clone(&connection);
        let buffer_size = config.read_buffer_size;
        thread::Builder::new()
            .name("rcon-recv".to_string())
            .spawn(move || loop_connection.receive_loop(reader, handler, buffer_size))?;

        tracing::debug!("Connected to {}", connection.peer_addr);
        Ok(connection)
    }

    /// Read until the socket closes, feeding the handler.
    fn receive_loop<H: StreamHandler>(&self, mut reader: TcpStream, mut handler: H, buffer_size: usize) {
        let mut buffer = vec![0u8; buffer_size];

        let (kind, reason) = loop {
            match reader.read(&mut buffer) {
                Ok(0) => {
                    if self.closing.load(Ordering::SeqCst) {
                        break (CloseKind::Closed, None);
                    }
                    break (CloseKind::Disconnected, None);
                }
                Ok(n) => {
                    tracing::trace!("Read {} bytes from {}", n, self.peer_addr);
                    if let Err(e) = handler.on_data(&buffer[..n]) {
                        tracing::error!("Dropping connection to {}: {}", self.peer_addr, e);
                        break (CloseKind::Lost, Some(e.to_string()));
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    if self.closing.load(Ordering::SeqCst) {
                        break (CloseKind::Closed, None);
                    }
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    break (CloseKind::Lost, Some(e.to_string()));
                }
            }
        };

        self.connected.store(false, Ordering::SeqCst);
        let _ = self.socket.shutdown(Shutdown::Both);

        tracing::debug!("Connection to {} {}", self.peer_addr, kind);
        handler.on_close(kind, reason);
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

impl Transport for TcpConnection {
    fn send(&self, frame: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(RconError::NotConnected);
        }

        let mut writer = self.writer.lock();
        writer.write_all(frame)?;
        writer.flush()?;

        tracing::trace!("Sent {} bytes to {}", frame.len(), self.peer_addr);
        Ok(())
    }

    fn disconnect(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.connected.store(false, Ordering::SeqCst);

        // Unblocks the read loop, which then reports `Closed`
        if let Err(e) = self.socket.shutdown(Shutdown::Both) {
            tracing::debug!("Shutdown of {} failed: {}", self.peer_addr, e);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// IP literals are used as-is, anything else goes through DNS
fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, port)]);
    }

    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| RconError::Connection(format!("Failed to resolve {}: {}", host, e)))?
        .collect();

    if addrs.is_empty() {
        return Err(RconError::Connection(format!("No addresses found for {}", host)));
    }

    Ok(addrs)
}
