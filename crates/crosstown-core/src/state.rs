//! Mutable per-game state: players, field ownership and the current turn.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use crosstown_protocol::{
    Direction, Event, FieldIndex, FieldKind, FieldState, Money, PendingAction,
    PlayerId, PlayerSnapshot, Snapshot, TurnSnapshot,
};
use serde::{Deserialize, Serialize};

use crate::board::{Board, FieldDefinition};
use crate::monopoly::{complete_owner, monopoly_changes};
use crate::rng::GameRng;
use crate::turn::TurnState;

/// Money constants of a game. All amounts are in cents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub start_balance: Money,
    /// Paid when a move crosses the start cell.
    pub start_bonus: Money,
    /// Paid when a move crosses or lands on a pass-bonus cell.
    pub pass_bonus: Money,
    pub jail_bail: Money,
    pub taxi_fare: Money,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            start_balance: 1_500_000,
            start_bonus: 200_000,
            pass_bonus: 50_000,
            jail_bail: 50_000,
            taxi_fare: 30_000,
        }
    }
}

/// Seat handed to the engine when a game starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seat {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
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
    /// Turns left under asset freeze.
    pub sequester: u32,
    pub refusal_to_pay: u32,
    pub refusal_to_chance: u32,
    /// Positive: next start bonuses doubled. Negative: next start bonuses withheld.
    pub plus_start: i32,
    /// Forced detours toward the center still owed.
    pub turn_to_start: u32,
    pub invest_income_block: BTreeSet<FieldIndex>,
    pub pending_actions: VecDeque<PendingAction>,
}

impl Player {
    pub fn new(seat: Seat, balance: Money) -> Self {
        Self {
            id: seat.id,
            name: seat.name,
            color: seat.color,
            balance,
            position: Some(FieldIndex::START),
            direction: None,
            is_bankrupt: false,
            is_offline: false,
            in_jail: false,
            in_taxi: false,
            in_exchange: false,
            sequester: 0,
            refusal_to_pay: 0,
            refusal_to_chance: 0,
            plus_start: 0,
            turn_to_start: 0,
            invest_income_block: BTreeSet::new(),
            pending_actions: VecDeque::new(),
        }
    }

    pub fn is_sequestered(&self) -> bool {
        self.sequester > 0
    }

    /// A refusal-to-pay credit not yet spoken for by a deferred obligation.
    pub fn can_defer(&self) -> bool {
        self.refusal_to_pay as usize > self.pending_actions.len()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            name: self.name.clone(),
            color: self.color.clone(),
            balance: self.balance,
            position: self.position,
            direction: self.direction,
            is_bankrupt: self.is_bankrupt,
            is_offline: self.is_offline,
            in_jail: self.in_jail,
            in_taxi: self.in_taxi,
            in_exchange: self.in_exchange,
            sequester: self.sequester,
            refusal_to_pay: self.refusal_to_pay,
            refusal_to_chance: self.refusal_to_chance,
            plus_start: self.plus_start,
            turn_to_start: self.turn_to_start,
            invest_income_block: self.invest_income_block.iter().copied().collect(),
            pending_actions: self.pending_actions.iter().copied().collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GameState {
    pub board: Arc<Board>,
    pub economy: EconomyConfig,
    pub players: Vec<Player>,
    pub fields: Vec<FieldState>,
    pub turn: TurnState,
    pub round: u32,
    pub rng: GameRng,
    /// Faces consumed before the RNG; lets tests and replays fix the dice.
    pub scripted_dice: VecDeque<u8>,
    pub winner: Option<PlayerId>,
    pub game_over: bool,
}

impl GameState {
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn field_def(&self, index: FieldIndex) -> Option<&FieldDefinition> {
        self.board.field(index)
    }

    pub fn field(&self, index: FieldIndex) -> Option<&FieldState> {
        self.fields.get(index.index())
    }

    pub fn owner_of(&self, index: FieldIndex) -> Option<PlayerId> {
        self.field(index).and_then(|f| f.owner)
    }

    /// First cell of the given kind, e.g. the jail.
    pub fn cell_of_kind(&self, kind: FieldKind) -> Option<FieldIndex> {
        self.board
            .fields()
            .iter()
            .find(|f| f.kind == kind)
            .map(|f| f.index)
    }

    /// Non-bankrupt players in seat order.
    pub fn solvent_players(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| !p.is_bankrupt)
            .map(|p| p.id)
            .collect()
    }

    pub fn owned_firms(&self, id: PlayerId) -> Vec<FieldIndex> {
        self.fields
            .iter()
            .filter(|f| f.owner == Some(id))
            .map(|f| f.index)
            .collect()
    }

    pub fn free_firms(&self) -> Vec<FieldIndex> {
        self.board
            .firms()
            .filter(|def| self.owner_of(def.index).is_none())
            .map(|def| def.index)
            .collect()
    }

    /// Firms of `id` that sit in at least one set `id` has completed.
    pub fn monopoly_fields(&self, id: PlayerId) -> Vec<FieldIndex> {
        let mut cells: Vec<FieldIndex> = self
            .board
            .monopolies()
            .iter()
            .filter(|m| complete_owner(m, &self.fields) == Some(id))
            .flat_map(|m| m.members.iter().copied())
            .collect();
        cells.sort();
        cells.dedup();
        cells
    }

    /// Half of everything paid into the field, purchase included.
    pub fn sale_value(&self, index: FieldIndex) -> Money {
        let level = self.field(index).map_or(0, |f| f.level);
        self.field_def(index)
            .map_or(0, |def| def.invested_value(level) / 2)
    }

    /// Change owners and report field and monopoly changes. Releasing a field resets its level.
    pub fn reassign(&mut self, changes: &[(FieldIndex, Option<PlayerId>)]) -> Vec<Event> {
        let before = self.fields.clone();
        let mut events = Vec::new();
        for &(index, owner) in changes {
            let Some(field) = self.fields.get_mut(index.index()) else {
                continue;
            };
            match owner {
                Some(owner) => field.owner = Some(owner),
                None => field.release(),
            }
            events.push(Event::FieldChanged { field: *field });
        }
        let touched: Vec<FieldIndex> = changes.iter().map(|(index, _)| *index).collect();
        events.extend(monopoly_changes(&self.board, &touched, &before, &self.fields));
        events
    }

    /// Next die face: scripted faces first, then the RNG.
    pub fn roll_die(&mut self) -> u8 {
        match self.scripted_dice.pop_front() {
            Some(face) if (1..=6).contains(&face) => face,
            _ => self.rng.roll_d6(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            round: self.round,
            current_player: self.turn.player(),
            turn: TurnSnapshot {
                player: self.turn.player(),
                awaiting: self.turn.awaiting(),
                candidates: self.turn.candidates().to_vec(),
                queued: self.turn.queued() as u32,
            },
            players: self.players.iter().map(Player::snapshot).collect(),
            fields: self.fields.clone(),
            winner: self.winner,
            game_over: self.game_over,
            rng_state: self.rng.state_bytes(),
        }
    }
}
