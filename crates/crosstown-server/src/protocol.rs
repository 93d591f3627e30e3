//! Network protocol messages for multiplayer.
//!
//! Wraps the core `Command`/`Event`/`Snapshot` model with lobby and session messages.

use serde::{Deserialize, Serialize};

use crosstown_protocol::{Command, Event, PlayerId, Snapshot};

/// Client-to-server messages
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Take a seat, or reclaim one with a token from an earlier `Registered`.
    Register {
        name: String,
        color: String,
        #[serde(default)]
        reconnect_token: Option<String>,
    },
    /// Start the game (host only)
    StartGame,
    /// A game command from the turn owner
    Command { command: Command },
    /// Discard the game and every registration
    Restart { admin_secret: String },
    /// Request current game state (for reconnection)
    RequestState,
    /// Ping for latency measurement
    Ping { timestamp: u64 },
}

/// Server-to-client messages
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    Registered {
        player_id: PlayerId,
        reconnect_token: String,
    },
    RegisterRejected { reason: RegisterRejectReason },
    /// Current lobby state (sent on registration and whenever the lobby changes)
    LobbyState {
        players: Vec<PlayerInfo>,
        host: Option<PlayerId>,
        min_players: u8,
        max_players: u8,
    },
    GameStarted { snapshot: Snapshot, checksum: u64 },
    /// Full game state (reconnection or explicit request)
    GameState { snapshot: Snapshot, checksum: u64 },
    /// Events produced by one committed command, with the checksum after it.
    StateDelta { events: Vec<Event>, checksum: u64 },
    /// Seat list with connection status
    Players { players: Vec<PlayerInfo> },
    CommandRejected { reason: CommandRejectReason },
    PlayerDisconnected { player_id: PlayerId },
    PlayerReconnected { player_id: PlayerId },
    GameRestarted,
    Pong {
        client_timestamp: u64,
        server_timestamp: u64,
    },
}

/// Reasons for rejecting a registration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterRejectReason {
    GameFull,
    GameInProgress,
    InvalidToken,
    AlreadyConnected,
    AlreadyRegistered,
    InvalidName,
}

/// Reasons for rejecting a command or lobby request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandRejectReason {
    NotRegistered,
    NoGameRunning,
    GameAlreadyStarted,
    NotHost,
    NotEnoughPlayers,
    NotYourTurn,
    NotAuthorized,
    RateLimited,
    /// The engine refused the command; `message` is the rule that failed.
    Rejected { message: String },
}

/// Seat info for lobby and player lists
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub player_id: PlayerId,
    pub name: String,
    pub color: String,
    pub is_host: bool,
    pub connected: bool,
}

/// Serialize a client message for network transmission
pub fn serialize_client_message(msg: &ClientMessage) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::encode::to_vec_named(msg)
}

/// Deserialize a client message from network data
pub fn deserialize_client_message(data: &[u8]) -> Result<ClientMessage, rmp_serde::decode::Error> {
    rmp_serde::decode::from_slice(data)
}

/// Serialize a server message for network transmission
pub fn serialize_server_message(msg: &ServerMessage) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::encode::to_vec_named(msg)
}

/// Deserialize a server message from network data
pub fn deserialize_server_message(data: &[u8]) -> Result<ServerMessage, rmp_serde::decode::Error> {
    rmp_serde::decode::from_slice(data)
}
