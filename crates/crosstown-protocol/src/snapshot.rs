use serde::{Deserialize, Serialize};

use crate::{Awaiting, Direction, FieldIndex, FieldState, Money, PendingAction, PlayerId};

/// Full game state for initial sync or rejoin
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub round: u32,
    pub current_player: PlayerId,
    pub turn: TurnSnapshot,
    pub players: Vec<PlayerSnapshot>,
    pub fields: Vec<FieldState>,
    #[serde(default)]
    pub winner: Option<PlayerId>,
    pub game_over: bool,
    pub rng_state: [u8; 32], // for determinism verification
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnSnapshot {
    pub player: PlayerId,
    pub awaiting: Awaiting,
    pub candidates: Vec<FieldIndex>,
    /// Actions still queued after the current one.
    pub queued: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub balance: Money,
    pub position: Option<FieldIndex>,
    pub direction: Option<Direction>,
    pub is_bankrupt: bool,
    pub is_offline: bool,
    pub in_jail: bool,
    pub in_taxi: bool,
    pub in_exchange: bool,
    pub sequester: u32,
    pub refusal_to_pay: u32,
    pub refusal_to_chance: u32,
    pub plus_start: i32,
    pub turn_to_start: u32,
    pub invest_income_block: Vec<FieldIndex>,
    pub pending_actions: Vec<PendingAction>,
}
