//! Connection tracking for the leaderboard relay
//!
//! This module handles the server-side bookkeeping of connected players:
//! - Player identifier assignment on connect
//! - Capacity enforcement against the configured player limit
//! - Per-connection outboxes used as broadcast targets
//! - Removal on disconnect or delivery failure
//!
//! The registry never touches a socket itself. Each registered connection
//! hands over the sending side of a bounded channel whose receiver is
//! drained by that connection's writer task. The registry holds the only
//! sender, so removing a connection closes its outbox and lets the writer
//! finish.

use log::{info, warn};
use shared::PlayerId;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Frames a connection may have queued before it counts as a failed
/// recipient. A player whose socket stops draining hits this limit and is
/// dropped instead of growing the queue without end.
pub const OUTBOX_CAPACITY: usize = 64;

/// A serialized frame shared by every recipient of one broadcast.
pub type Frame = Arc<str>;

/// Sending side of a connection's writer task.
pub type Outbox = mpsc::Sender<Frame>;

/// Creates the outbox for a new connection and the inbox its writer drains.
pub fn outbox_channel() -> (Outbox, mpsc::Receiver<Frame>) {
    mpsc::channel(OUTBOX_CAPACITY)
}

/// A registered player connection
#[derive(Debug)]
pub struct Connection {
    /// Identifier assigned when the connection was accepted
    pub id: PlayerId,
    /// Remote address, used for logging
    pub addr: SocketAddr,
    outbox: Outbox,
}

impl Connection {
    /// Wraps the outbox of a freshly accepted connection
    pub fn new(id: PlayerId, addr: SocketAddr, outbox: Outbox) -> Self {
        Self { id, addr, outbox }
    }

    /// Queues a frame for the writer task without waiting
    ///
    /// Fails once the writer has stopped, or when the writer is already
    /// `OUTBOX_CAPACITY` frames behind.
    pub fn push(&self, frame: &Frame) -> bool {
        match self.outbox.try_send(Arc::clone(frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Player {} is {} leaderboards behind",
                    self.id, OUTBOX_CAPACITY
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Tracks every live connection and hands out player identifiers
///
/// Identifiers start at 1 and increase for every accepted connection; they
/// are never reused, so a reconnecting player always gets a new one. Entries
/// are kept ordered by identifier, which makes broadcasts visit players in
/// the order they joined.
pub struct ConnectionRegistry {
    connections: BTreeMap<PlayerId, Connection>,
    next_id: u32,
    max_connections: usize,
}

impl ConnectionRegistry {
    /// Creates an empty registry admitting at most `max_connections` players
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: BTreeMap::new(),
            next_id: 1,
            max_connections,
        }
    }

    /// Attempts to register a new connection
    ///
    /// Returns the assigned identifier, or None if the relay is already at
    /// capacity. The capacity check and the insert happen under the same
    /// borrow, so two simultaneous connects cannot both take the last slot.
    pub fn register(&mut self, addr: SocketAddr, outbox: Outbox) -> Option<PlayerId> {
        if self.is_full() {
            return None;
        }

        let id = PlayerId(self.next_id);
        self.next_id += 1;

        self.connections.insert(id, Connection::new(id, addr, outbox));
        info!(
            "Player {} joined from {} ({} connected)",
            id,
            addr,
            self.connections.len()
        );

        Some(id)
    }

    /// Removes a connection, closing its outbox
    ///
    /// Returns false if it was already gone. Both connection tasks and the
    /// broadcast path may race to remove the same player, so a second call
    /// is expected and harmless.
    pub fn unregister(&mut self, id: PlayerId) -> bool {
        match self.connections.remove(&id) {
            Some(connection) => {
                info!(
                    "Player {} ({}) disconnected ({} connected)",
                    id,
                    connection.addr,
                    self.connections.len()
                );
                true
            }
            None => false,
        }
    }

    /// Queues `frame` for every registered connection
    ///
    /// Delivery is best-effort per recipient: a refused frame does not stop
    /// the loop. The identifiers whose outbox refused the frame, because it
    /// is closed or full, are returned so the caller can unregister them.
    pub fn broadcast(&self, frame: &Frame) -> Vec<PlayerId> {
        self.connections
            .values()
            .filter(|connection| !connection.push(frame))
            .map(|connection| connection.id)
            .collect()
    }

    /// Checks whether `id` is still registered
    ///
    /// Connection tasks use this to stop handling updates from a player that
    /// was dropped for falling behind.
    pub fn contains(&self, id: PlayerId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Identifiers of every registered connection, in join order
    pub fn ids(&self) -> Vec<PlayerId> {
        self.connections.keys().copied().collect()
    }

    /// Drops every connection, closing their outboxes
    pub fn clear(&mut self) {
        self.connections.clear();
    }

    /// True when another `register` call would be refused
    pub fn is_full(&self) -> bool {
        self.connections.len() >= self.max_connections
    }

    /// The configured player limit
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// True when no player is connected
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
