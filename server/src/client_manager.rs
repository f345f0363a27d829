//! Session registry and outbound routing for the multiplayer server
//!
//! This module handles the server-side bookkeeping of connected sessions:
//! - Session id allocation (monotonic, never reused while the server runs)
//! - Capacity enforcement
//! - Bounded per-session outbound queues feeding each connection's writer task
//! - Routing of unicast and broadcast events with exact exclusion

use crate::game::Outbound;
use log::{debug, info, warn};
use shared::{ServerEvent, SessionId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::AbortHandle;

/// Events a session may have waiting for its writer before it counts as stalled.
pub const OUTBOUND_QUEUE_LEN: usize = 256;

/// Result of queueing one event for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The writer is gone; the reader will report the close.
    Closed,
    /// The peer is not draining its queue.
    Full,
}

/// A connected session and the queue its writer task drains
#[derive(Debug)]
pub struct Client {
    /// Identifier assigned when the connection was accepted
    pub id: SessionId,
    /// Remote address, kept for logging
    pub addr: SocketAddr,
    /// When the connection was accepted
    pub connected_at: Instant,
    sender: mpsc::Sender<ServerEvent>,
    tasks: Vec<AbortHandle>,
}

impl Client {
    pub fn new(id: SessionId, addr: SocketAddr, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
            tasks: Vec::new(),
        }
    }

    /// Queues an event for this session's writer without waiting.
    pub fn send(&self, event: ServerEvent) -> Delivery {
        match self.sender.try_send(event) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Manages all connected sessions
///
/// Owned by the server's event loop; nothing else reads or writes it, so no
/// locking is needed.
pub struct ClientManager {
    clients: HashMap<SessionId, Client>,
    next_session_id: SessionId,
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty registry. Session ids start at 1.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_session_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection.
    ///
    /// Returns `None` when the server is at capacity; no id is consumed in
    /// that case.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::Sender<ServerEvent>,
    ) -> Option<SessionId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let session_id = self.next_session_id;
        self.next_session_id += 1;

        info!("Session {} connected from {}", session_id, addr);
        self.clients
            .insert(session_id, Client::new(session_id, addr, sender));
        Some(session_id)
    }

    /// Ties a session's I/O tasks to its registration; they are aborted when it is removed.
    pub fn attach_tasks(&mut self, session_id: SessionId, tasks: Vec<AbortHandle>) {
        match self.clients.get_mut(&session_id) {
            Some(client) => client.tasks.extend(tasks),
            None => {
                for task in tasks {
                    task.abort();
                }
            }
        }
    }

    /// Drops a session, its outbound queue and its I/O tasks.
    pub fn remove_client(&mut self, session_id: SessionId) -> bool {
        if let Some(client) = self.clients.remove(&session_id) {
            info!(
                "Session {} ({}) disconnected after {:.1}s",
                client.id,
                client.addr,
                client.connected_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.clients.contains_key(&session_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn send_to(&self, session_id: SessionId, event: ServerEvent) -> Delivery {
        match self.clients.get(&session_id) {
            Some(client) => {
                let delivery = client.send(event);
                if delivery == Delivery::Closed {
                    debug!("Writer for session {} is gone, dropping event", session_id);
                }
                delivery
            }
            None => {
                debug!("No session {} to send to", session_id);
                Delivery::Closed
            }
        }
    }

    /// Sends an event to every session except `exclude`.
    ///
    /// Returns the sessions whose queue was full.
    pub fn broadcast(&self, event: &ServerEvent, exclude: Option<SessionId>) -> Vec<SessionId> {
        self.clients
            .values()
            .filter(|client| Some(client.id) != exclude)
            .filter(|client| client.send(event.clone()) == Delivery::Full)
            .map(|client| client.id)
            .collect()
    }

    /// Routes one outbound event and returns the sessions found stalled.
    pub fn dispatch(&self, outbound: Outbound) -> Vec<SessionId> {
        let stalled = match outbound {
            Outbound::To { session_id, event } => match self.send_to(session_id, event) {
                Delivery::Full => vec![session_id],
                _ => Vec::new(),
            },
            Outbound::Broadcast { event, exclude } => self.broadcast(&event, exclude),
        };

        for session_id in &stalled {
            warn!(
                "Session {} has {} events queued, treating it as stalled",
                session_id, OUTBOUND_QUEUE_LEN
            );
        }
        stalled
    }
}
