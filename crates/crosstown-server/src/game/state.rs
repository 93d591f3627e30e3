//! Server-authoritative game session.
//!
//! The rules live in `crosstown_core::GameEngine`. The session wraps it with:
//! - the current `Snapshot` and its deterministic checksum
//! - atomic command application (scratch clone, commit on success)
//! - offline marking for dropped seats

use std::sync::Arc;

use crosstown_core::{Board, EconomyConfig, GameEngine, GameError, Seat};
use crosstown_protocol::{Command, Event, PlayerId, Snapshot};
use tracing::{debug, error};

/// Result of validating and applying one command.
#[derive(Clone, Debug, PartialEq)]
pub enum ApplyResult {
    /// Command committed; `events` is the delta to broadcast.
    Success { events: Vec<Event>, checksum: u64 },
    /// Sender does not own the turn.
    NotYourTurn,
    /// The engine refused the command; nothing changed.
    Rejected { reason: String },
}

#[derive(Debug)]
pub struct GameSession {
    engine: GameEngine,
    snapshot: Snapshot,
    checksum: u64,
}

impl GameSession {
    pub fn new(engine: GameEngine) -> Self {
        let snapshot = engine.snapshot();
        let checksum = checksum_of(&snapshot);
        Self {
            engine,
            snapshot,
            checksum,
        }
    }

    /// Seat the players and open the first turn.
    pub fn start(
        board: Arc<Board>,
        economy: EconomyConfig,
        seats: Vec<Seat>,
        seed: u64,
    ) -> Result<Self, GameError> {
        GameEngine::new(board, economy, seats, seed).map(Self::new)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn checksum(&self) -> u64 {
        self.checksum
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn current_player(&self) -> PlayerId {
        self.engine.current_player()
    }

    pub fn is_game_over(&self) -> bool {
        self.engine.is_game_over()
    }

    /// Events a client needs after a full snapshot to render the open prompt.
    pub fn opening_events(&self) -> Vec<Event> {
        self.engine.opening_events()
    }

    /// Apply `command` for `player` atomically.
    pub fn apply_command(&mut self, player: PlayerId, command: Command) -> ApplyResult {
        let mut scratch = self.engine.clone();
        let events = match scratch.apply_command_checked(player, command) {
            Ok(events) => events,
            Err(GameError::NotYourTurn) => return ApplyResult::NotYourTurn,
            Err(err) => {
                debug!(%player, %err, "command rejected");
                return ApplyResult::Rejected {
                    reason: err.to_string(),
                };
            }
        };

        self.engine = scratch;
        self.refresh();

        ApplyResult::Success {
            events,
            checksum: self.checksum,
        }
    }

    /// Flag a seat offline or back online. `None` when nothing changed.
    pub fn set_offline(&mut self, player: PlayerId, offline: bool) -> Option<Event> {
        let event = self.engine.set_offline(player, offline)?;
        self.refresh();
        Some(event)
    }

    fn refresh(&mut self) {
        self.snapshot = self.engine.snapshot();
        self.checksum = checksum_of(&self.snapshot);
    }
}

fn checksum_of(snapshot: &Snapshot) -> u64 {
    match crosstown_protocol::wire::snapshot_hash(snapshot) {
        Ok(hash) => hash,
        Err(err) => {
            error!(%err, "failed to hash snapshot");
            0
        }
    }
}
