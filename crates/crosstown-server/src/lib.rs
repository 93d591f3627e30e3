//! Crosstown multiplayer server.
//!
//! Authoritative host for one game at a time over Renet. Every inbound message is handled on the
//! tick loop, so game transitions never interleave.

pub mod channels;
pub mod config;
pub mod game;
pub mod player_manager;
pub mod protocol;
pub mod server;
pub mod transport;

pub use channels::*;
pub use config::{ConfigError, ServerConfig};
pub use game::{ApplyResult, GameSession};
pub use player_manager::{AddPlayerError, LobbyError, Player, PlayerManager, ReconnectError};
pub use protocol::*;
pub use server::{Outgoing, Server};
pub use transport::{ServerRunner, TransportConfig, TransportError, PROTOCOL_ID};
