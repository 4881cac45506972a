//! Server network layer handling UDP communications and the command loop

use crate::config::GameConfig;
use crate::error::GameError;
use crate::game::{Game, RoundTicket};
use crate::session_hub::{SessionId, SessionSender, SESSION_QUEUE_DEPTH};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{ErrorKind, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const RECV_BUFFER_SIZE: usize = 4096;
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Messages delivered to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    RoundTimer { round_number: u32 },
    Shutdown,
}

/// Owns the game and serializes every mutation through one select loop
pub struct Server {
    socket: Arc<UdpSocket>,
    game: Game,
    round_timer: Option<JoinHandle<()>>,
    receiver_task: Option<JoinHandle<()>>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: GameConfig) -> ServerResult<Self> {
        config.validate()?;

        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            game: Game::new(config),
            round_timer: None,
            receiver_task: None,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Handle for posting messages, such as `Shutdown`, into the loop
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&mut self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        self.receiver_task = Some(tokio::spawn(async move {
            let mut buffer = [0u8; RECV_BUFFER_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }));
    }

    /// Spawns the writer task draining one session's outbound queue
    fn spawn_session_writer(&self, addr: SocketAddr) -> SessionSender {
        let socket = Arc::clone(&self.socket);
        let (tx, mut rx) = mpsc::channel::<Packet>(SESSION_QUEUE_DEPTH);

        tokio::spawn(async move {
            while let Some(packet) = rx.recv().await {
                if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                    break;
                }
            }
        });

        tx
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> ServerResult<()> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    /// Replies to an address that has no session
    async fn send_unsessioned(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = Self::send_packet_impl(socket, packet, addr).await {
            error!("Failed to send packet to {}: {}", addr, e);
        }
    }

    fn arm_round_timer(&mut self, ticket: RoundTicket) {
        self.cancel_round_timer();

        let server_tx = self.server_tx.clone();
        self.round_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(ticket.timer_duration).await;
            let message = ServerMessage::RoundTimer {
                round_number: ticket.round_number,
            };
            if let Err(e) = server_tx.send(message) {
                error!("Failed to deliver round timer: {}", e);
            }
        }));
    }

    fn cancel_round_timer(&mut self) {
        if let Some(timer) = self.round_timer.take() {
            timer.abort();
        }
    }

    /// Sends the typed acknowledgement for a command back to its sender
    fn reply<T>(&mut self, session_id: SessionId, result: Result<T, GameError>) {
        let packet = match result {
            Ok(_) => Packet::Accepted,
            Err(e) => {
                debug!("Session {} command rejected: {}", session_id, e);
                Packet::Rejected {
                    error: e.kind(),
                    message: e.to_string(),
                }
            }
        };
        self.game.sessions_mut().send_to(session_id, packet);
    }

    fn reject_not_joined(&mut self, session_id: SessionId) {
        let packet = Packet::Rejected {
            error: ErrorKind::NotJoined,
            message: "join the game before guessing".to_string(),
        };
        self.game.sessions_mut().send_to(session_id, packet);
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            let response = Packet::Disconnected {
                reason: "Protocol version mismatch".to_string(),
            };
            Self::send_unsessioned(&self.socket, &response, addr).await;
            return;
        }

        // Remove existing connection if present
        if let Some(existing_id) = self.game.sessions().find_session_by_addr(addr) {
            info!("Removing existing session {} from {}", existing_id, addr);
            self.game.disconnect(existing_id);
        }

        let sender = self.spawn_session_writer(addr);
        match self.game.sessions_mut().register(Some(addr), sender) {
            Some(session_id) => {
                self.game
                    .sessions_mut()
                    .send_to(session_id, Packet::Connected { session_id });
            }
            None => {
                let response = Packet::Disconnected {
                    reason: "Server full".to_string(),
                };
                Self::send_unsessioned(&self.socket, &response, addr).await;
            }
        }
    }

    /// Processes one inbound packet against the game
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect { client_version } = packet {
            self.handle_connect(client_version, addr).await;
            return;
        }

        let Some(session_id) = self.game.sessions().find_session_by_addr(addr) else {
            warn!("Packet from unknown address {}", addr);
            return;
        };
        self.game.sessions_mut().touch(session_id);
        let player_name = self
            .game
            .sessions()
            .player_name(session_id)
            .map(str::to_string);

        match packet {
            Packet::Heartbeat => {}

            Packet::Join { player_name } => {
                let result = self.game.join_session(session_id, &player_name);
                self.reply(session_id, result);
            }

            Packet::Resume { player_name } => {
                let result = self.game.resume(session_id, &player_name);
                self.reply(session_id, result);
            }

            Packet::SubmitGuess { year, bet } => match player_name {
                Some(name) => {
                    let result = self.game.submit_guess(&name, year, bet);
                    self.reply(session_id, result);
                }
                None => self.reject_not_joined(session_id),
            },

            Packet::SetBet { bet } => match player_name {
                Some(name) => {
                    let result = self.game.set_bet(&name, bet);
                    self.reply(session_id, result);
                }
                None => self.reject_not_joined(session_id),
            },

            Packet::StartRound {
                song,
                correct_year,
                timer_secs,
            } => {
                let result = self
                    .game
                    .start_round(song, correct_year, timer_secs.map(Duration::from_secs));
                if let Ok(ticket) = &result {
                    self.arm_round_timer(*ticket);
                }
                self.reply(session_id, result);
            }

            Packet::LockRound => {
                let result = self.game.lock_round();
                if result.is_ok() {
                    self.cancel_round_timer();
                }
                self.reply(session_id, result);
            }

            Packet::AdvanceRound => {
                let result = self.game.advance_round();
                self.cancel_round_timer();
                self.reply(session_id, result);
            }

            Packet::Disconnect => {
                self.game.disconnect(session_id);
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> ServerResult<()> {
        self.spawn_network_receiver();

        let mut sweep_interval = interval(SESSION_SWEEP_INTERVAL);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::RoundTimer { round_number }) => {
                            if self.game.on_round_timer(round_number) {
                                self.round_timer = None;
                            }
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = sweep_interval.tick() => {
                    let timeout = self.game.state().config.session_timeout;
                    let removed = self.game.sessions_mut().check_timeouts(timeout);
                    if !removed.is_empty() {
                        debug!("Swept {} idle sessions", removed.len());
                    }
                },
            }
        }

        self.cancel_round_timer();
        if let Some(receiver) = self.receiver_task.take() {
            receiver.abort();
        }

        Ok(())
    }
}
