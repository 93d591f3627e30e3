//! Seat management combining lobby registration and connection state.
//!
//! One table owns the client mapping, host, and reconnect tokens so they never drift apart.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crosstown_core::Seat;
use crosstown_protocol::PlayerId;
use rand::Rng;

use crate::protocol::PlayerInfo;

/// Seat lifecycle state
#[derive(Clone, Debug)]
pub enum PlayerState {
    /// Registered, waiting for the host to start
    InLobby,
    /// Connected and playing
    Playing {
        connected_at: Instant,
        last_activity: Instant,
    },
    /// Dropped during the game; the seat stays and the turn stalls
    Disconnected { disconnected_at: Instant },
}

#[derive(Clone, Debug)]
pub struct Player {
    pub player_id: PlayerId,
    pub name: String,
    pub color: String,
    pub client_id: Option<u64>,
    pub reconnect_token: String,
    pub state: PlayerState,
    /// Rate limiting: message count in current window
    pub message_count: u32,
    /// Rate limiting: window start time
    pub rate_window_start: Instant,
}

impl Player {
    pub fn is_connected(&self) -> bool {
        self.client_id.is_some()
    }
}

pub struct PlayerManager {
    players: HashMap<PlayerId, Player>,
    client_to_player: HashMap<u64, PlayerId>,
    tokens: HashMap<String, PlayerId>,
    host: Option<PlayerId>,
    game_started: bool,
    min_players: u8,
    max_players: u8,
    /// Tokens of seats disconnected longer than this are revoked.
    reconnect_grace: Duration,
    rate_limit_messages: u32,
    rate_limit_window: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AddPlayerError {
    #[error("Game is full")]
    GameFull,
    #[error("Game already started")]
    GameInProgress,
    #[error("Client already holds a seat")]
    AlreadyRegistered,
    #[error("Player name must not be empty")]
    InvalidName,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReconnectError {
    #[error("Invalid reconnect token")]
    InvalidToken,
    #[error("Player not found")]
    PlayerNotFound,
    #[error("Player already connected")]
    AlreadyConnected,
    #[error("Cannot reconnect during lobby")]
    NotInGame,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("Game already started")]
    GameAlreadyStarted,
    #[error("Only host can perform this action")]
    NotHost,
    #[error("Need at least {needed} players, have {have}")]
    NotEnoughPlayers { needed: u8, have: usize },
}

impl PlayerManager {
    pub fn new(min_players: u8, max_players: u8, reconnect_grace: Duration) -> Self {
        Self {
            players: HashMap::new(),
            client_to_player: HashMap::new(),
            tokens: HashMap::new(),
            host: None,
            game_started: false,
            min_players,
            max_players,
            reconnect_grace,
            rate_limit_messages: 60,
            rate_limit_window: Duration::from_secs(1),
        }
    }

    /// Seat a new client in the lobby. The first seat becomes host.
    pub fn add_player(
        &mut self,
        client_id: u64,
        name: String,
        color: String,
    ) -> Result<(PlayerId, String), AddPlayerError> {
        if self.game_started {
            return Err(AddPlayerError::GameInProgress);
        }
        if self.client_to_player.contains_key(&client_id) {
            return Err(AddPlayerError::AlreadyRegistered);
        }
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AddPlayerError::InvalidName);
        }
        if self.player_count() >= self.max_players as usize {
            return Err(AddPlayerError::GameFull);
        }

        let player_id = self.next_player_id()?;
        let token = generate_token();
        let now = Instant::now();

        self.players.insert(
            player_id,
            Player {
                player_id,
                name,
                color,
                client_id: Some(client_id),
                reconnect_token: token.clone(),
                state: PlayerState::InLobby,
                message_count: 0,
                rate_window_start: now,
            },
        );
        self.client_to_player.insert(client_id, player_id);
        self.tokens.insert(token.clone(), player_id);

        if self.host.is_none() {
            self.host = Some(player_id);
        }

        Ok((player_id, token))
    }

    /// Reclaim a seat dropped during the game.
    pub fn reconnect(&mut self, client_id: u64, token: &str) -> Result<PlayerId, ReconnectError> {
        let player_id = self
            .tokens
            .get(token)
            .copied()
            .ok_or(ReconnectError::InvalidToken)?;

        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(ReconnectError::PlayerNotFound)?;

        match &player.state {
            PlayerState::InLobby => Err(ReconnectError::NotInGame),
            PlayerState::Playing { .. } => Err(ReconnectError::AlreadyConnected),
            PlayerState::Disconnected { .. } => {
                let now = Instant::now();
                player.state = PlayerState::Playing {
                    connected_at: now,
                    last_activity: now,
                };
                player.client_id = Some(client_id);
                player.message_count = 0;
                player.rate_window_start = now;
                self.client_to_player.insert(client_id, player_id);
                Ok(player_id)
            }
        }
    }

    /// Handle a client disconnect. Lobby seats are freed; game seats go offline.
    /// Drop the seat bound to `client_id`. Before the game starts the seat is freed. Once seated in
    /// a game it stays, marked disconnected, until a restart.
    pub fn disconnect(&mut self, client_id: u64) -> Option<PlayerId> {
        let player_id = self.client_to_player.remove(&client_id)?;
        let player = self.players.get_mut(&player_id)?;

        match player.state {
            PlayerState::InLobby => {
                self.players.remove(&player_id);
                self.tokens.retain(|_, id| *id != player_id);

                if self.host == Some(player_id) {
                    self.host = self.players.keys().min().copied();
                }
            }
            PlayerState::Playing { .. } => {
                player.state = PlayerState::Disconnected {
                    disconnected_at: Instant::now(),
                };
                player.client_id = None;
            }
            PlayerState::Disconnected { .. } => {}
        }

        Some(player_id)
    }

    /// Move every lobby seat into the game and return the seats in id order.
    pub fn start_game(&mut self, requester: PlayerId) -> Result<Vec<Seat>, LobbyError> {
        if self.game_started {
            return Err(LobbyError::GameAlreadyStarted);
        }
        if !self.is_host(requester) {
            return Err(LobbyError::NotHost);
        }
        let have = self.player_count();
        if have < self.min_players as usize {
            return Err(LobbyError::NotEnoughPlayers {
                needed: self.min_players,
                have,
            });
        }

        self.game_started = true;
        let now = Instant::now();
        let mut seats = Vec::with_capacity(have);
        for player in self.players.values_mut() {
            player.state = PlayerState::Playing {
                connected_at: now,
                last_activity: now,
            };
            seats.push(Seat {
                id: player.player_id,
                name: player.name.clone(),
                color: player.color.clone(),
            });
        }
        seats.sort_by_key(|seat| seat.id);
        Ok(seats)
    }

    /// Revoke tokens of seats that stayed disconnected past the grace period.
    ///
    /// The seat itself stays in the game, permanently offline.
    pub fn expire_disconnected(&mut self) -> Vec<PlayerId> {
        let now = Instant::now();
        let mut expired = Vec::new();

        for player in self.players.values() {
            if let PlayerState::Disconnected { disconnected_at } = player.state {
                if now.duration_since(disconnected_at) >= self.reconnect_grace
                    && self.tokens.contains_key(&player.reconnect_token)
                {
                    expired.push(player.player_id);
                }
            }
        }
        self.tokens.retain(|_, id| !expired.contains(id));
        expired.sort();
        expired
    }

    pub fn update_activity(&mut self, client_id: u64) {
        if let Some(player_id) = self.client_to_player.get(&client_id) {
            if let Some(player) = self.players.get_mut(player_id) {
                if let PlayerState::Playing { last_activity, .. } = &mut player.state {
                    *last_activity = Instant::now();
                }
            }
        }
    }

    /// Returns false once a client exceeds its message budget for the current window.
    pub fn check_rate_limit(&mut self, client_id: u64) -> bool {
        let Some(player_id) = self.client_to_player.get(&client_id).copied() else {
            return true; // unregistered clients are rejected later
        };
        let Some(player) = self.players.get_mut(&player_id) else {
            return true;
        };

        let now = Instant::now();
        if now.duration_since(player.rate_window_start) >= self.rate_limit_window {
            player.rate_window_start = now;
            player.message_count = 0;
        }

        player.message_count += 1;
        player.message_count <= self.rate_limit_messages
    }

    /// Drop every seat and token, back to an empty lobby.
    pub fn reset(&mut self) {
        self.players.clear();
        self.client_to_player.clear();
        self.tokens.clear();
        self.host = None;
        self.game_started = false;
    }

    // --- Query methods ---

    pub fn get_player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.get(&player_id)
    }

    pub fn get_player_by_client(&self, client_id: u64) -> Option<PlayerId> {
        self.client_to_player.get(&client_id).copied()
    }

    pub fn client_of(&self, player_id: PlayerId) -> Option<u64> {
        self.players.get(&player_id).and_then(|p| p.client_id)
    }

    pub fn is_host(&self, player_id: PlayerId) -> bool {
        self.host == Some(player_id)
    }

    pub fn host(&self) -> Option<PlayerId> {
        self.host
    }

    pub fn has_started(&self) -> bool {
        self.game_started
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_connected(&self, player_id: PlayerId) -> bool {
        self.players
            .get(&player_id)
            .is_some_and(|p| matches!(p.state, PlayerState::Playing { .. }))
    }

    pub fn connected_clients(&self) -> Vec<u64> {
        self.players.values().filter_map(|p| p.client_id).collect()
    }

    /// Seats in id order, for `LobbyState` and `Players`.
    pub fn player_infos(&self) -> Vec<PlayerInfo> {
        let mut infos: Vec<PlayerInfo> = self
            .players
            .values()
            .map(|p| PlayerInfo {
                player_id: p.player_id,
                name: p.name.clone(),
                color: p.color.clone(),
                is_host: self.host == Some(p.player_id),
                connected: p.is_connected(),
            })
            .collect();
        infos.sort_by_key(|info| info.player_id);
        infos
    }

    pub fn min_players(&self) -> u8 {
        self.min_players
    }

    pub fn max_players(&self) -> u8 {
        self.max_players
    }

    fn next_player_id(&self) -> Result<PlayerId, AddPlayerError> {
        (0..self.max_players)
            .map(PlayerId)
            .find(|id| !self.players.contains_key(id))
            .ok_or(AddPlayerError::GameFull)
    }
}

fn generate_token() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..32)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> PlayerManager {
        PlayerManager::new(2, 4, Duration::from_secs(60))
    }

    fn seat(mgr: &mut PlayerManager, client: u64, name: &str) -> (PlayerId, String) {
        mgr.add_player(client, name.into(), "#336699".into())
            .unwrap()
    }

    #[test]
    fn first_player_is_host_and_host_moves_on_leave() {
        let mut mgr = manager();
        let (p0, _) = seat(&mut mgr, 100, "Ada");
        let (p1, _) = seat(&mut mgr, 101, "Bo");
        assert_eq!(mgr.host(), Some(p0));

        mgr.disconnect(100);
        assert_eq!(mgr.host(), Some(p1));
        assert_eq!(mgr.player_count(), 1);
    }

    #[test]
    fn freed_lobby_id_is_reused() {
        let mut mgr = manager();
        seat(&mut mgr, 100, "Ada");
        let (p1, _) = seat(&mut mgr, 101, "Bo");
        mgr.disconnect(101);
        let (again, _) = seat(&mut mgr, 102, "Cy");
        assert_eq!(again, p1);
    }

    #[test]
    fn registration_limits() {
        let mut mgr = PlayerManager::new(2, 2, Duration::from_secs(60));
        seat(&mut mgr, 1, "Ada");
        assert_eq!(
            mgr.add_player(1, "Ada".into(), "red".into()),
            Err(AddPlayerError::AlreadyRegistered)
        );
        assert_eq!(
            mgr.add_player(2, "   ".into(), "red".into()),
            Err(AddPlayerError::InvalidName)
        );
        seat(&mut mgr, 2, "Bo");
        assert_eq!(
            mgr.add_player(3, "Cy".into(), "red".into()),
            Err(AddPlayerError::GameFull)
        );
    }

    #[test]
    fn only_host_starts_with_enough_players() {
        let mut mgr = manager();
        let (p0, _) = seat(&mut mgr, 100, "Ada");
        assert_eq!(
            mgr.start_game(p0),
            Err(LobbyError::NotEnoughPlayers { needed: 2, have: 1 })
        );

        let (p1, _) = seat(&mut mgr, 101, "Bo");
        assert_eq!(mgr.start_game(p1), Err(LobbyError::NotHost));

        let seats = mgr.start_game(p0).unwrap();
        assert_eq!(seats.iter().map(|s| s.id).collect::<Vec<_>>(), vec![p0, p1]);
        assert_eq!(seats[1].name, "Bo");
        assert!(mgr.has_started());
        assert!(mgr.is_connected(p0));
        assert_eq!(
            mgr.add_player(102, "Cy".into(), "red".into()),
            Err(AddPlayerError::GameInProgress)
        );
    }

    #[test]
    fn reconnection_flow() {
        let mut mgr = manager();
        let (p0, token) = seat(&mut mgr, 100, "Ada");
        assert_eq!(mgr.reconnect(200, &token), Err(ReconnectError::NotInGame));

        seat(&mut mgr, 101, "Bo");
        mgr.start_game(p0).unwrap();
        assert_eq!(
            mgr.reconnect(200, &token),
            Err(ReconnectError::AlreadyConnected)
        );

        assert_eq!(mgr.disconnect(100), Some(p0));
        assert!(!mgr.is_connected(p0));
        assert_eq!(mgr.player_count(), 2);

        assert_eq!(mgr.reconnect(102, &token), Ok(p0));
        assert!(mgr.is_connected(p0));
        assert_eq!(mgr.get_player_by_client(102), Some(p0));
        assert_eq!(mgr.reconnect(103, "bogus"), Err(ReconnectError::InvalidToken));
    }

    #[test]
    fn expired_tokens_are_revoked() {
        let mut mgr = PlayerManager::new(2, 4, Duration::from_millis(10));
        let (p0, token) = seat(&mut mgr, 100, "Ada");
        seat(&mut mgr, 101, "Bo");
        mgr.start_game(p0).unwrap();
        mgr.disconnect(100);

        assert!(mgr.expire_disconnected().is_empty());
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(mgr.expire_disconnected(), vec![p0]);
        assert!(mgr.expire_disconnected().is_empty());
        assert_eq!(mgr.reconnect(102, &token), Err(ReconnectError::InvalidToken));
    }

    #[test]
    fn rate_limiting() {
        let mut mgr = manager();
        mgr.rate_limit_messages = 5;
        mgr.rate_limit_window = Duration::from_millis(100);
        seat(&mut mgr, 100, "Ada");

        for _ in 0..5 {
            assert!(mgr.check_rate_limit(100));
        }
        assert!(!mgr.check_rate_limit(100));

        std::thread::sleep(Duration::from_millis(110));
        assert!(mgr.check_rate_limit(100));
    }

    #[test]
    fn reset_clears_everything() {
        let mut mgr = manager();
        let (p0, token) = seat(&mut mgr, 100, "Ada");
        seat(&mut mgr, 101, "Bo");
        mgr.start_game(p0).unwrap();

        mgr.reset();
        assert!(!mgr.has_started());
        assert_eq!(mgr.host(), None);
        assert!(mgr.player_infos().is_empty());
        assert_eq!(mgr.reconnect(102, &token), Err(ReconnectError::InvalidToken));
    }

    #[test]
    fn tokens_are_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
