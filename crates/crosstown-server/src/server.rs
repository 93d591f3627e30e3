//! Message handling for one hosted game, independent of the transport.
//!
//! The tick loop feeds decoded client traffic in and drains the outbox after each tick. Replies
//! are queued in the order their mutations committed.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crosstown_core::Board;
use crosstown_protocol::{Command, Event, PlayerId};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::game::{ApplyResult, GameSession};
use crate::player_manager::{AddPlayerError, LobbyError, PlayerManager, ReconnectError};
use crate::protocol::{
    deserialize_client_message, ClientMessage, CommandRejectReason, RegisterRejectReason,
    ServerMessage,
};

/// A message waiting to be written to the transport.
#[derive(Clone, Debug, PartialEq)]
pub enum Outgoing {
    Direct {
        client_id: u64,
        message: ServerMessage,
    },
    Broadcast { message: ServerMessage },
}

pub struct Server {
    config: ServerConfig,
    board: Arc<Board>,
    players: PlayerManager,
    game: Option<GameSession>,
    outbox: Vec<Outgoing>,
}

impl Server {
    pub fn new(config: ServerConfig, board: Arc<Board>) -> Self {
        let players = PlayerManager::new(
            config.min_players,
            config.max_players,
            config.reconnect_grace,
        );
        Self {
            config,
            board,
            players,
            game: None,
            outbox: Vec::new(),
        }
    }

    pub fn players(&self) -> &PlayerManager {
        &self.players
    }

    pub fn game(&self) -> Option<&GameSession> {
        self.game.as_ref()
    }

    /// Take everything queued since the last drain.
    pub fn drain_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    /// Decode and handle one raw message from `client_id`.
    pub fn handle_data(&mut self, client_id: u64, data: &[u8]) {
        if !self.players.check_rate_limit(client_id) {
            warn!("Rate limit exceeded for client {:?}", client_id);
            return;
        }

        let message = match deserialize_client_message(data) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Failed to deserialize message from {:?}: {}", client_id, e);
                return;
            }
        };

        self.handle_message(client_id, message);
    }

    pub fn handle_message(&mut self, client_id: u64, message: ClientMessage) {
        self.players.update_activity(client_id);

        match message {
            ClientMessage::Register {
                name,
                color,
                reconnect_token,
            } => match reconnect_token {
                Some(token) => self.handle_reconnect(client_id, &token),
                None => self.handle_register(client_id, name, color),
            },
            ClientMessage::StartGame => self.handle_start_game(client_id),
            ClientMessage::Command { command } => self.handle_command(client_id, command),
            ClientMessage::Restart { admin_secret } => self.handle_restart(client_id, &admin_secret),
            ClientMessage::RequestState => self.handle_state_request(client_id),
            ClientMessage::Ping { timestamp } => self.send(
                client_id,
                ServerMessage::Pong {
                    client_timestamp: timestamp,
                    server_timestamp: unix_millis(),
                },
            ),
        }
    }

    pub fn client_connected(&mut self, client_id: u64) {
        info!("Client {:?} connected", client_id);
    }

    pub fn client_disconnected(&mut self, client_id: u64) {
        let Some(player_id) = self.players.disconnect(client_id) else {
            return;
        };
        info!(%player_id, "Client {:?} dropped its seat", client_id);

        if self.players.has_started() {
            self.mark_offline(player_id, true);
            self.broadcast(ServerMessage::PlayerDisconnected { player_id });
            self.broadcast_players();
        } else {
            self.broadcast_lobby_state();
        }
    }

    /// Periodic housekeeping: revoke reconnect tokens past their grace period.
    pub fn tick(&mut self) {
        for player_id in self.players.expire_disconnected() {
            info!(%player_id, "Reconnect grace expired");
        }
    }

    fn handle_register(&mut self, client_id: u64, name: String, color: String) {
        match self.players.add_player(client_id, name, color) {
            Ok((player_id, reconnect_token)) => {
                info!(%player_id, "Client {:?} registered", client_id);
                self.send(
                    client_id,
                    ServerMessage::Registered {
                        player_id,
                        reconnect_token,
                    },
                );
                self.broadcast_lobby_state();
            }
            Err(err) => {
                warn!("Registration from {:?} rejected: {}", client_id, err);
                let reason = match err {
                    AddPlayerError::GameFull => RegisterRejectReason::GameFull,
                    AddPlayerError::GameInProgress => RegisterRejectReason::GameInProgress,
                    AddPlayerError::AlreadyRegistered => RegisterRejectReason::AlreadyRegistered,
                    AddPlayerError::InvalidName => RegisterRejectReason::InvalidName,
                };
                self.send(client_id, ServerMessage::RegisterRejected { reason });
            }
        }
    }

    fn handle_reconnect(&mut self, client_id: u64, token: &str) {
        let player_id = match self.players.reconnect(client_id, token) {
            Ok(player_id) => player_id,
            Err(err) => {
                warn!("Reconnect from {:?} rejected: {}", client_id, err);
                let reason = match err {
                    ReconnectError::InvalidToken | ReconnectError::PlayerNotFound => {
                        RegisterRejectReason::InvalidToken
                    }
                    ReconnectError::AlreadyConnected | ReconnectError::NotInGame => {
                        RegisterRejectReason::AlreadyConnected
                    }
                };
                self.send(client_id, ServerMessage::RegisterRejected { reason });
                return;
            }
        };

        info!(%player_id, "Client {:?} reclaimed its seat", client_id);
        self.send(
            client_id,
            ServerMessage::Registered {
                player_id,
                reconnect_token: token.to_string(),
            },
        );
        self.mark_offline(player_id, false);
        self.broadcast(ServerMessage::PlayerReconnected { player_id });
        self.broadcast_players();
        self.handle_state_request(client_id);
    }

    fn handle_start_game(&mut self, client_id: u64) {
        let Some(player_id) = self.players.get_player_by_client(client_id) else {
            self.reject(client_id, CommandRejectReason::NotRegistered);
            return;
        };

        let seats = match self.players.start_game(player_id) {
            Ok(seats) => seats,
            Err(err) => {
                warn!(%player_id, "Start refused: {}", err);
                let reason = match err {
                    LobbyError::GameAlreadyStarted => CommandRejectReason::GameAlreadyStarted,
                    LobbyError::NotHost => CommandRejectReason::NotHost,
                    LobbyError::NotEnoughPlayers { .. } => CommandRejectReason::NotEnoughPlayers,
                };
                self.reject(client_id, reason);
                return;
            }
        };

        let seed = self.config.seed.unwrap_or_else(clock_seed);
        let game = match GameSession::start(
            Arc::clone(&self.board),
            self.config.economy.clone(),
            seats,
            seed,
        ) {
            Ok(game) => game,
            Err(err) => {
                error!("Failed to create game: {}", err);
                self.players.reset();
                self.reject(
                    client_id,
                    CommandRejectReason::Rejected {
                        message: err.to_string(),
                    },
                );
                self.broadcast(ServerMessage::GameRestarted);
                return;
            }
        };

        info!(
            players = self.players.player_count(),
            seed, "Game started"
        );
        let snapshot = game.snapshot().clone();
        let checksum = game.checksum();
        let events = game.opening_events();
        self.game = Some(game);

        self.broadcast(ServerMessage::GameStarted { snapshot, checksum });
        self.broadcast(ServerMessage::StateDelta { events, checksum });
    }

    fn handle_command(&mut self, client_id: u64, command: Command) {
        let Some(player_id) = self.players.get_player_by_client(client_id) else {
            warn!("Command from unregistered client {:?}", client_id);
            self.reject(client_id, CommandRejectReason::NotRegistered);
            return;
        };
        let Some(game) = self.game.as_mut() else {
            self.reject(client_id, CommandRejectReason::NoGameRunning);
            return;
        };

        let name = command.name();
        match game.apply_command(player_id, command) {
            ApplyResult::Success { events, checksum } => {
                debug!(%player_id, command = name, events = events.len(), "command applied");
                if let Some(winner) = events.iter().find_map(|e| match e {
                    Event::GameEnded { winner } => Some(*winner),
                    _ => None,
                }) {
                    info!(?winner, "Game over");
                }
                self.broadcast(ServerMessage::StateDelta { events, checksum });
            }
            ApplyResult::NotYourTurn => {
                warn!(%player_id, command = name, "Command out of turn");
                self.reject(client_id, CommandRejectReason::NotYourTurn);
            }
            ApplyResult::Rejected { reason } => {
                warn!(%player_id, command = name, %reason, "Command rejected");
                self.reject(
                    client_id,
                    CommandRejectReason::Rejected { message: reason },
                );
            }
        }
    }

    fn handle_restart(&mut self, client_id: u64, secret: &str) {
        if !self.config.admin_allows(secret) {
            warn!("Restart from {:?} refused", client_id);
            self.reject(client_id, CommandRejectReason::NotAuthorized);
            return;
        }

        info!("Game restarted by {:?}", client_id);
        self.game = None;
        self.players.reset();
        self.broadcast(ServerMessage::GameRestarted);
    }

    fn handle_state_request(&mut self, client_id: u64) {
        match &self.game {
            Some(game) => {
                let snapshot = game.snapshot().clone();
                let checksum = game.checksum();
                let events = game.opening_events();
                self.send(client_id, ServerMessage::GameState { snapshot, checksum });
                self.send(client_id, ServerMessage::StateDelta { events, checksum });
            }
            None => {
                let message = self.lobby_state();
                self.send(client_id, message);
            }
        }
    }

    fn mark_offline(&mut self, player_id: PlayerId, offline: bool) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        if let Some(event) = game.set_offline(player_id, offline) {
            let checksum = game.checksum();
            self.broadcast(ServerMessage::StateDelta {
                events: vec![event],
                checksum,
            });
        }
    }

    fn lobby_state(&self) -> ServerMessage {
        ServerMessage::LobbyState {
            players: self.players.player_infos(),
            host: self.players.host(),
            min_players: self.players.min_players(),
            max_players: self.players.max_players(),
        }
    }

    fn broadcast_lobby_state(&mut self) {
        let message = self.lobby_state();
        self.broadcast(message);
    }

    fn broadcast_players(&mut self) {
        let players = self.players.player_infos();
        self.broadcast(ServerMessage::Players { players });
    }

    fn reject(&mut self, client_id: u64, reason: CommandRejectReason) {
        self.send(client_id, ServerMessage::CommandRejected { reason });
    }

    fn send(&mut self, client_id: u64, message: ServerMessage) {
        self.outbox.push(Outgoing::Direct { client_id, message });
    }

    fn broadcast(&mut self, message: ServerMessage) {
        self.outbox.push(Outgoing::Broadcast { message });
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5eed)
}
