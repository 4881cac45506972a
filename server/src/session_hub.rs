//! Live connection tracking and broadcast fan-out
//!
//! This module keeps the registry of connected sessions, independent of which
//! player (if any) each session speaks for:
//! - Session lifecycle (register, unregister, idle timeout)
//! - Binding a session to a player name after a join or resume
//! - Direct replies to a single session
//! - Best-effort broadcast of game events to every session
//!
//! Every session owns a bounded outbound queue. Delivery uses `try_send`, so a
//! slow or vanished peer never blocks the caller; a session whose queue is
//! full or closed is logged and pruned while delivery continues to the rest.

use log::{info, warn};
use shared::{GameEvent, Packet};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub type SessionId = u32;

/// Outbound queue feeding one connection's writer task.
pub type SessionSender = mpsc::Sender<Packet>;

/// Depth of each session's outbound queue
pub const SESSION_QUEUE_DEPTH: usize = 64;

/// One live client connection
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    /// Remote address when the session arrived over the network
    pub addr: Option<SocketAddr>,
    /// Player this connection speaks for, once joined
    pub player_name: Option<String>,
    /// Last time we received any packet from this session
    pub last_seen: Instant,
    sender: SessionSender,
}

impl Session {
    pub fn new(id: SessionId, addr: Option<SocketAddr>, sender: SessionSender) -> Self {
        Self {
            id,
            addr,
            player_name: None,
            last_seen: Instant::now(),
            sender,
        }
    }

    /// False once the writer side of the connection has gone away
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    pub fn refresh(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    fn deliver(&self, packet: Packet) -> Result<(), mpsc::error::TrySendError<Packet>> {
        self.sender.try_send(packet)
    }
}

/// Registry of live sessions and the broadcast fan-out over them
pub struct SessionHub {
    sessions: HashMap<SessionId, Session>,
    next_session_id: SessionId,
    max_sessions: usize,
}

impl SessionHub {
    /// Creates an empty hub. Session ids start from 1.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            next_session_id: 1,
            max_sessions,
        }
    }

    /// Registers a new session.
    ///
    /// Returns None when the hub is at capacity.
    pub fn register(&mut self, addr: Option<SocketAddr>, sender: SessionSender) -> Option<SessionId> {
        if self.sessions.len() >= self.max_sessions {
            return None;
        }

        let id = self.next_session_id;
        self.next_session_id += 1;

        match addr {
            Some(addr) => info!("Session {} connected from {}", id, addr),
            None => info!("Session {} connected", id),
        }
        self.sessions.insert(id, Session::new(id, addr, sender));
        Some(id)
    }

    /// Removes a session. Safe to call for ids that are already gone.
    pub fn unregister(&mut self, id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        match &session.player_name {
            Some(name) => info!("Session {} ('{}') disconnected", id, name),
            None => info!("Session {} disconnected", id),
        }
        Some(session)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn find_session_by_addr(&self, addr: SocketAddr) -> Option<SessionId> {
        self.sessions
            .values()
            .find(|session| session.addr == Some(addr))
            .map(|session| session.id)
    }

    /// Session currently speaking for `player_name`, if any
    pub fn session_for_player(&self, player_name: &str) -> Option<SessionId> {
        self.sessions
            .values()
            .find(|session| session.player_name.as_deref() == Some(player_name))
            .map(|session| session.id)
    }

    pub fn player_name(&self, id: SessionId) -> Option<&str> {
        self.sessions.get(&id)?.player_name.as_deref()
    }

    /// Associates a session with a player. Returns false for unknown sessions.
    pub fn bind_player(&mut self, id: SessionId, player_name: &str) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.player_name = Some(player_name.to_string());
                true
            }
            None => false,
        }
    }

    pub fn touch(&mut self, id: SessionId) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.refresh();
        }
    }

    /// Sends a direct reply to one session.
    ///
    /// A failed delivery prunes the session and returns false.
    pub fn send_to(&mut self, id: SessionId, packet: Packet) -> bool {
        let result = match self.sessions.get(&id) {
            Some(session) => session.deliver(packet),
            None => return false,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping session {}: direct reply failed ({})", id, e);
                self.unregister(id);
                false
            }
        }
    }

    /// Delivers `event` to every registered session.
    ///
    /// Best effort and at most once per session. Sessions that cannot accept
    /// the event are pruned; the rest still receive it. Returns how many
    /// sessions the event was handed to.
    pub fn broadcast(&mut self, event: &GameEvent) -> usize {
        let mut delivered = 0;
        let mut failed = Vec::new();

        for (id, session) in &self.sessions {
            match session.deliver(Packet::Event(event.clone())) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        "Failed to deliver {} to session {}: {}",
                        event.name(),
                        id,
                        e
                    );
                    failed.push(*id);
                }
            }
        }

        for id in failed {
            self.unregister(id);
        }

        delivered
    }

    /// Removes sessions that have been silent longer than `timeout`.
    ///
    /// Returns the removed ids so the transport can forget their addresses.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<SessionId> {
        let timed_out: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|session| session.is_timed_out(timeout) || !session.is_alive())
            .map(|session| session.id)
            .collect();

        for id in &timed_out {
            self.unregister(*id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
