//! Request/reply correlation
//!
//! Replies carry no request id, so they are matched purely by position: the
//! server answers in the order requests were written. The queue holds one
//! entry per outstanding request, oldest first, and every decoded packet
//! completes the head.
//!
//! ## Concurrency
//! - `queue`: the only state shared between the send path and the receive
//!   thread
//! - `send_lock`: held across enqueue + write so queue order is wire order
//! - Completion slots are single-use bounded channels, filled while the
//!   queue lock is held

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::{RconError, Result};
use crate::network::{CloseKind, Transport};
use crate::protocol::{Packet, PacketType};

/// An outstanding request waiting for its reply
struct PendingRequest {
    /// Local identity, used to find the entry again on timeout
    ticket: u64,

    expected: PacketType,

    slot: Sender<Result<Packet>>,
}

/// What happened to a decoded packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Head completed with the packet
    Delivered,

    /// Head completed with `AuthFailure`
    AuthRejected,

    /// Head completed with `ProtocolMismatch`; the stream is out of step
    Mismatch { expected: PacketType, actual: PacketType },

    /// Nobody was waiting
    Unsolicited,
}

/// FIFO matcher of replies to requests
pub struct Correlator {
    queue: Mutex<VecDeque<PendingRequest>>,
    send_lock: Mutex<()>,
    next_ticket: AtomicU64,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            send_lock: Mutex::new(()),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Queue a request, write its frame and wait for the reply.
    ///
    /// On timeout the entry is removed so later replies stay aligned.
    pub fn submit(
        &self,
        transport: &dyn Transport,
        frame: &[u8],
        expected: PacketType,
        timeout: Duration,
    ) -> Result<Packet> {
        let (ticket, rx) = self.enqueue_and_send(transport, frame, expected)?;
        self.wait(ticket, rx, timeout)
    }

    fn enqueue_and_send(
        &self,
        transport: &dyn Transport,
        frame: &[u8],
        expected: PacketType,
    ) -> Result<(u64, Receiver<Result<Packet>>)> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = channel::bounded(1);

        let _send_guard = self.send_lock.lock();

        // Auth restarts command sequencing
        if expected == PacketType::AuthReply {
            self.fail_all_with(|| RconError::TransportLost(CloseKind::Closed));
        }

        self.queue.lock().push_back(PendingRequest {
            ticket,
            expected,
            slot: tx,
        });

        if let Err(e) = transport.send(frame) {
            self.remove(ticket);
            return Err(e);
        }

        Ok((ticket, rx))
    }

    fn wait(&self, ticket: u64, rx: Receiver<Result<Packet>>, timeout: Duration) -> Result<Packet> {
        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                if !self.remove(ticket) {
                    // Resolved between the timeout firing and the removal
                    if let Ok(result) = rx.try_recv() {
                        return result;
                    }
                }
                tracing::warn!("Request timed out after {:?}", timeout);
                Err(RconError::CommandTimeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(RconError::TransportLost(CloseKind::Lost))
            }
        }
    }

    /// Complete the head of the queue with a decoded packet.
    pub fn resolve(&self, packet: Packet) -> Resolution {
        let mut queue = self.queue.lock();

        let head = match queue.pop_front() {
            Some(head) => head,
            None => {
                tracing::warn!(
                    "Unsolicited {:?} packet (id {}): {:?}",
                    packet.kind,
                    packet.request_id,
                    packet.body
                );
                return Resolution::Unsolicited;
            }
        };

        // Rejected auth overrides whatever the head expected
        if packet.is_auth_failure() {
            let _ = head.slot.send(Err(RconError::AuthFailure));
            return Resolution::AuthRejected;
        }

        if packet.kind != head.expected {
            let (expected, actual) = (head.expected, packet.kind);
            let _ = head.slot.send(Err(RconError::ProtocolMismatch { expected, actual }));
            return Resolution::Mismatch { expected, actual };
        }

        let _ = head.slot.send(Ok(packet));
        Resolution::Delivered
    }

    /// Complete the head with an error (e.g. an undecodable packet).
    ///
    /// Returns false when nothing was pending.
    pub fn fail_head(&self, error: RconError) -> bool {
        match self.queue.lock().pop_front() {
            Some(head) => {
                let _ = head.slot.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Complete every pending request with `TransportLost(kind)`.
    pub fn fail_all(&self, kind: CloseKind) {
        self.fail_all_with(|| RconError::TransportLost(kind));
    }

    fn fail_all_with(&self, error: impl Fn() -> RconError) {
        let mut queue = self.queue.lock();
        if !queue.is_empty() {
            tracing::debug!("Failing {} pending request(s)", queue.len());
        }
        for pending in queue.drain(..) {
            let _ = pending.slot.send(Err(error()));
        }
    }

    /// Number of requests awaiting a reply
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    fn remove(&self, ticket: u64) -> bool {
        let mut queue = self.queue.lock();
        match queue.iter().position(|p| p.ticket == ticket) {
            Some(index) => {
                queue.remove(index);
                true
            }
            None => false,
        }
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}
