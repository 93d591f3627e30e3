//! The per-game orchestrator. Commands are validated against the turn owner's prompt and the
//! board before anything is mutated.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

use crosstown_protocol::{
    Awaiting, Command, Direction, Event, FieldIndex, FieldKind, FieldState, InvestmentKind,
    Money, MonopolyId, PaymentReason, PendingAction, PlayerId, PositionChoice, Snapshot,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::board::{Board, InvestmentOption};
use crate::chance::{chance_entry, position_candidates, DieFace, FollowUp};
use crate::monopoly::{complete_owner, field_income};
use crate::movement::{can_turn_to_center, compute_path, MoveError};
use crate::rng::GameRng;
use crate::state::{EconomyConfig, GameState, Player, Seat};
use crate::turn::{Action, Step, TurnState};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("game is over")]
    GameOver,
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("player {0} is bankrupt")]
    Bankrupt(PlayerId),
    #[error("not your turn")]
    NotYourTurn,
    #[error("{command} is not accepted while {awaiting:?}")]
    UnexpectedCommand {
        command: &'static str,
        awaiting: Awaiting,
    },
    #[error("field {0} is not a legal target")]
    IllegalTarget(FieldIndex),
    #[error("unknown field {0}")]
    UnknownField(FieldIndex),
    #[error("field {0} is not a firm")]
    NotAFirm(FieldIndex),
    #[error("field {0} is already owned")]
    AlreadyOwned(FieldIndex),
    #[error("field {0} is not owned by the player")]
    NotOwned(FieldIndex),
    #[error("not enough money (need {needed}, have {available})")]
    NotEnoughMoney { needed: Money, available: Money },
    #[error("player is sequestered")]
    Sequestered,
    #[error("field {0} has no further investment tier")]
    NoInvestmentTier(FieldIndex),
    #[error("field {0} is blocked for the rest of the turn")]
    FieldBlocked(FieldIndex),
    #[error("investment requires a sacrifice")]
    SacrificeRequired,
    #[error("field {0} cannot be sacrificed for this investment")]
    InvalidSacrifice(FieldIndex),
    #[error("player is not standing on field {0}")]
    NotOnField(FieldIndex),
    #[error("field {0} has no investment to remove")]
    NothingInvested(FieldIndex),
    #[error("unknown monopoly")]
    UnknownMonopoly,
    #[error("monopoly is not complete for the player")]
    MonopolyNotComplete,
    #[error("no refusal credit left")]
    NoRefusalCredit,
    #[error("no deferred obligation pending")]
    NoPendingObligation,
    #[error("a firm must be named to settle the loss")]
    FieldRequired,
    #[error("field {0} cannot be exchanged")]
    InvalidExchange(FieldIndex),
    #[error("current prompt cannot be declined")]
    CannotDecline,
    #[error("movement failed: {0}")]
    Movement(#[from] MoveError),
    #[error("a game needs at least two players")]
    NotEnoughPlayers,
    #[error("player {0} is seated twice")]
    DuplicatePlayer(PlayerId),
    #[error("die face {0} has no chance table entry")]
    InvalidDie(u8),
}

fn die_face(face: u8) -> Result<DieFace, GameError> {
    DieFace::new(face).ok_or_else(|| {
        error!(face, "die face outside the chance table");
        GameError::InvalidDie(face)
    })
}

#[derive(Clone, Debug)]
pub struct GameEngine {
    state: GameState,
}

impl GameEngine {
    /// Seat the players on the center and open the first turn.
    pub fn new(
        board: Arc<Board>,
        economy: EconomyConfig,
        mut seats: Vec<Seat>,
        seed: u64,
    ) -> Result<Self, GameError> {
        if seats.len() < 2 {
            return Err(GameError::NotEnoughPlayers);
        }
        seats.sort_by_key(|seat| seat.id);
        if let Some(pair) = seats.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(GameError::DuplicatePlayer(pair[0].id));
        }

        let first = seats[0].id;
        let players = seats
            .into_iter()
            .map(|seat| Player::new(seat, economy.start_balance))
            .collect();
        let fields = (0..FieldIndex::COUNT as u8)
            .map(|i| FieldState::unowned(FieldIndex(i)))
            .collect();

        let mut engine = Self {
            state: GameState {
                board,
                economy,
                players,
                fields,
                turn: TurnState::new(first),
                round: 1,
                rng: GameRng::seed_from_u64(seed),
                scripted_dice: VecDeque::new(),
                winner: None,
                game_over: false,
            },
        };
        let mut events = Vec::new();
        engine.drive(&mut events);
        info!(players = engine.state.players.len(), seed, "game created");
        Ok(engine)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    pub fn current_player(&self) -> PlayerId {
        self.state.turn.player()
    }

    pub fn awaiting(&self) -> Awaiting {
        self.state.turn.awaiting()
    }

    pub fn is_game_over(&self) -> bool {
        self.state.game_over
    }

    /// Queue die faces to be consumed before the RNG.
    pub fn script_dice(&mut self, faces: impl IntoIterator<Item = u8>) {
        self.state.scripted_dice.extend(faces);
    }

    /// The input the turn owner owes right now.
    pub fn prompt(&self) -> Event {
        Event::Prompt {
            player: self.state.turn.player(),
            awaiting: self.state.turn.awaiting(),
            candidates: self.state.turn.candidates().to_vec(),
        }
    }

    /// Events a late joiner needs to render the turn in progress.
    pub fn opening_events(&self) -> Vec<Event> {
        vec![
            Event::TurnStarted {
                round: self.state.round,
                player: self.state.turn.player(),
            },
            self.prompt(),
        ]
    }

    pub fn set_offline(&mut self, player: PlayerId, offline: bool) -> Option<Event> {
        let p = self.state.player_mut(player)?;
        if p.is_offline == offline {
            return None;
        }
        p.is_offline = offline;
        Some(Event::PlayerOffline { player, offline })
    }

    pub fn apply_command(&mut self, player: PlayerId, command: Command) -> Vec<Event> {
        self.apply_command_checked(player, command)
            .unwrap_or_default()
    }

    pub fn apply_command_checked(
        &mut self,
        player: PlayerId,
        command: Command,
    ) -> Result<Vec<Event>, GameError> {
        if self.state.game_over {
            return Err(GameError::GameOver);
        }
        if self.state.player(player).is_none() {
            return Err(GameError::UnknownPlayer(player));
        }
        if player != self.state.turn.player() {
            return Err(GameError::NotYourTurn);
        }

        let awaiting = self.state.turn.awaiting();
        debug!(%player, command = command.name(), ?awaiting, "applying command");
        let mut events = self.dispatch(player, awaiting, command)?;
        self.settle(&mut events);
        Ok(events)
    }

    fn dispatch(
        &mut self,
        player: PlayerId,
        awaiting: Awaiting,
        command: Command,
    ) -> Result<Vec<Event>, GameError> {
        use Awaiting as W;

        match (awaiting, command) {
            (W::WaitingDirectionAtCenter, Command::ChooseDirection { direction }) => {
                self.choose_direction(player, direction)
            }
            (W::WaitingDiceRoll, Command::RollDice) => self.roll_move(player),
            (W::WaitingGoOrStay, Command::GoOrStay { go }) => self.go_or_stay(player, go),
            (W::WaitingJailOrTaxiDecision, Command::JailOrTaxi { pay }) => {
                self.jail_or_taxi(player, pay)
            }
            (W::WaitingFirstChanceDie, Command::RollDice) => Ok(self.roll_first_chance_die(player)),
            (W::WaitingSecondChanceDie, Command::RollDice) => self.roll_second_chance_die(player),
            (W::WaitingChanceDecision, Command::AcceptChance) => self.accept_chance(player),
            (W::WaitingChanceDecision, Command::RefuseChance) => self.refuse_chance(player),
            (W::WaitingBuy, Command::Buy { field }) => self.buy(player, field),
            (W::WaitingSell, Command::Sell { field }) => self.forced_sale(player, field),
            (W::WaitingSellMonopoly, Command::SellMonopoly { monopoly }) => {
                self.sell_monopoly(player, monopoly)
            }
            (W::WaitingChange, Command::Exchange { own, other }) => {
                self.exchange(player, own, other)
            }
            (W::WaitingSacrifice, Command::Sacrifice { field }) => self.sacrifice(player, field),
            (W::WaitingInvestFree, Command::Invest { field, sacrifice }) => {
                self.free_invest(player, field, sacrifice)
            }
            (W::WaitingRemoveInvest, Command::RemoveInvestment { field }) => {
                self.remove_investment(player, field)
            }
            (W::WaitingPositionChoice { .. }, Command::ChooseTarget { field }) => {
                self.choose_target(player, field)
            }
            (W::WaitingPendingPaymentOrLoss, Command::PayDeferred { field }) => {
                self.pay_deferred(player, field)
            }
            (W::WaitingPendingPaymentOrLoss, Command::RefuseDeferred) => {
                self.refuse_deferred(player)
            }
            (W::WaitingBuy | W::WaitingChange | W::WaitingInvestFree, Command::Decline) => {
                Ok(self.decline(player))
            }
            (W::TurnEnded, Command::Sell { field }) => self.sell(player, field),
            (W::TurnEnded, Command::Invest { field, sacrifice }) => {
                self.invest(player, field, sacrifice)
            }
            (W::TurnEnded, Command::ClaimIncome { field }) => self.claim_income(player, field),
            (W::TurnEnded, Command::EndTurn) => {
                let mut events = Vec::new();
                self.finish_turn(&mut events);
                Ok(events)
            }
            (_, Command::Decline) => Err(GameError::CannotDecline),
            (awaiting, command) => Err(GameError::UnexpectedCommand {
                command: command.name(),
                awaiting,
            }),
        }
    }

    /// Drive the turn to its next wait, close turns of bankrupt owners and report the prompt.
    fn settle(&mut self, events: &mut Vec<Event>) {
        loop {
            self.drive(events);
            if self.check_game_end(events) {
                return;
            }
            let current = self.state.turn.player();
            if self.state.player(current).is_some_and(|p| p.is_bankrupt) {
                self.finish_turn(events);
                continue;
            }
            break;
        }
        events.push(self.prompt());
    }

    fn drive(&mut self, events: &mut Vec<Event>) {
        loop {
            let id = self.state.turn.player();
            let Some(player) = self.state.players.iter().find(|p| p.id == id) else {
                return;
            };
            if player.is_bankrupt {
                return;
            }
            match self.state.turn.advance(player) {
                Step::Await(_) => return,
                Step::Closed => {
                    debug!(player = %id, "turn reached its end");
                    return;
                }
                Step::Execute(action) => {
                    self.state.turn.complete_current();
                    if let Action::Move {
                        backward,
                        steps: Some(steps),
                    } = action
                    {
                        let detour = self.state.player(id).is_some_and(|p| p.turn_to_start > 0);
                        match self.state.perform_move(id, steps, backward, detour) {
                            Ok(moved) => events.extend(moved),
                            Err(err) => warn!(player = %id, %err, "queued move skipped"),
                        }
                    }
                }
            }
        }
    }

    fn check_game_end(&mut self, events: &mut Vec<Event>) -> bool {
        if self.state.game_over {
            return true;
        }
        let solvent = self.state.solvent_players();
        if solvent.len() > 1 {
            return false;
        }
        let winner = solvent.first().copied();
        self.state.game_over = true;
        self.state.winner = winner;
        info!(?winner, round = self.state.round, "game ended");
        events.push(Event::GameEnded { winner });
        true
    }

    /// Close the current turn and open the next solvent player's.
    fn finish_turn(&mut self, events: &mut Vec<Event>) {
        let current = self.state.turn.player();
        if let Some(p) = self.state.player_mut(current) {
            p.sequester = p.sequester.saturating_sub(1);
            p.invest_income_block.clear();
            p.in_exchange = false;
        }
        events.push(Event::TurnEnded { player: current });

        let Some((next, wrapped)) = self.next_player(current) else {
            return;
        };
        if wrapped {
            self.state.round += 1;
        }
        self.state.turn = TurnState::new(next);
        info!(player = %next, round = self.state.round, "turn started");
        events.push(Event::TurnStarted {
            round: self.state.round,
            player: next,
        });
    }

    fn next_player(&self, current: PlayerId) -> Option<(PlayerId, bool)> {
        let players = &self.state.players;
        let at = players.iter().position(|p| p.id == current)?;
        (1..=players.len())
            .map(|offset| (at + offset) % players.len())
            .find(|&i| !players[i].is_bankrupt)
            .map(|i| (players[i].id, i <= at))
    }

    fn active(&self, id: PlayerId) -> Result<&Player, GameError> {
        let player = self
            .state
            .player(id)
            .ok_or(GameError::UnknownPlayer(id))?;
        if player.is_bankrupt {
            return Err(GameError::Bankrupt(id));
        }
        Ok(player)
    }

    fn active_mut(&mut self, id: PlayerId) -> Result<&mut Player, GameError> {
        self.state
            .player_mut(id)
            .ok_or(GameError::UnknownPlayer(id))
    }

    fn require_candidate(&self, field: FieldIndex) -> Result<(), GameError> {
        if self.state.turn.candidates().contains(&field) {
            Ok(())
        } else {
            Err(GameError::IllegalTarget(field))
        }
    }

    fn require_owned(&self, player: PlayerId, field: FieldIndex) -> Result<(), GameError> {
        if self.state.field_def(field).is_none() {
            return Err(GameError::UnknownField(field));
        }
        if self.state.owner_of(field) == Some(player) {
            Ok(())
        } else {
            Err(GameError::NotOwned(field))
        }
    }

    fn current_move_backward(&self) -> bool {
        matches!(
            self.state.turn.current(),
            Some(Action::Move { backward: true, .. })
        )
    }

    fn choose_direction(
        &mut self,
        player: PlayerId,
        direction: Direction,
    ) -> Result<Vec<Event>, GameError> {
        self.active_mut(player)?.direction = Some(direction);
        Ok(vec![Event::DirectionChosen { player, direction }])
    }

    fn roll_move(&mut self, player: PlayerId) -> Result<Vec<Event>, GameError> {
        let p = self.active(player)?;
        let from = p.position.ok_or(GameError::Bankrupt(player))?;
        let (direction, detour) = (p.direction, p.turn_to_start > 0);
        let backward = self.current_move_backward();

        let first = self.state.roll_die();
        let second = self.state.roll_die();
        let steps = first + second;
        let mut events = vec![Event::DiceRolled {
            player,
            faces: vec![first, second],
        }];

        let can_turn = can_turn_to_center(from, steps, backward, direction);
        if can_turn && !detour {
            self.state.turn.pending_steps = Some(steps);
            return Ok(events);
        }
        self.state.turn.complete_current();
        events.extend(self.state.perform_move(player, steps, backward, can_turn)?);
        Ok(events)
    }

    fn go_or_stay(&mut self, player: PlayerId, go: bool) -> Result<Vec<Event>, GameError> {
        let steps = self
            .state
            .turn
            .pending_steps
            .ok_or(GameError::UnexpectedCommand {
                command: "GoOrStay",
                awaiting: Awaiting::WaitingGoOrStay,
            })?;
        let backward = self.current_move_backward();
        self.state.turn.complete_current();
        Ok(self.state.perform_move(player, steps, backward, go)?)
    }

    fn jail_or_taxi(&mut self, player: PlayerId, pay: bool) -> Result<Vec<Event>, GameError> {
        let p = self.active(player)?;
        let jailed = p.in_jail;
        let (fee, reason) = if jailed {
            (self.state.economy.jail_bail, PaymentReason::JailBail)
        } else {
            (self.state.economy.taxi_fare, PaymentReason::TaxiFare)
        };
        if pay {
            if p.is_sequestered() {
                return Err(GameError::Sequestered);
            }
            if p.balance < fee {
                return Err(GameError::NotEnoughMoney {
                    needed: fee,
                    available: p.balance,
                });
            }
        }

        let mut events = Vec::new();
        if pay {
            events.extend(self.state.settle_payment(player, None, fee, reason));
        }
        let p = self.active_mut(player)?;
        if jailed {
            p.in_jail = false;
            if !pay {
                // Serving the jail turn consumes the move.
                self.state.turn.complete_current();
            }
        } else {
            p.in_taxi = false;
            if pay {
                self.state.turn.complete_current();
                let choice = PositionChoice::Perimeter;
                self.state.turn.push_front(Action::Prompt {
                    awaiting: Awaiting::WaitingPositionChoice { choice },
                    candidates: position_candidates(choice),
                });
            }
        }
        events.push(Event::JailOrTaxiResolved { player, paid: pay });
        Ok(events)
    }

    fn roll_first_chance_die(&mut self, player: PlayerId) -> Vec<Event> {
        let face = self.state.roll_die();
        self.state.turn.first_die = Some(face);
        vec![Event::DiceRolled {
            player,
            faces: vec![face],
        }]
    }

    fn roll_second_chance_die(&mut self, player: PlayerId) -> Result<Vec<Event>, GameError> {
        let refusal_credits = self.active(player)?.refusal_to_chance;
        let first = self
            .state
            .turn
            .first_die
            .ok_or(GameError::UnexpectedCommand {
                command: "RollDice",
                awaiting: Awaiting::WaitingSecondChanceDie,
            })?;
        let first = die_face(first)?;
        let second = die_face(self.state.roll_die())?;
        let entry = chance_entry(first, second);

        let mut events = vec![
            Event::DiceRolled {
                player,
                faces: vec![second.get()],
            },
            Event::ChanceDrawn {
                player,
                first: first.get(),
                second: second.get(),
                label: entry.label.to_string(),
                adverse: entry.adverse,
            },
        ];
        if entry.adverse && refusal_credits > 0 {
            self.state.turn.drawn = Some((first.get(), second.get()));
            return Ok(events);
        }
        self.state.turn.complete_current();
        events.extend(self.resolve_chance(player, first, second));
        Ok(events)
    }

    fn drawn_faces(&self) -> Result<(DieFace, DieFace), GameError> {
        let (first, second) = self.state.turn.drawn.ok_or(GameError::UnexpectedCommand {
            command: "AcceptChance",
            awaiting: self.state.turn.awaiting(),
        })?;
        Ok((die_face(first)?, die_face(second)?))
    }

    fn accept_chance(&mut self, player: PlayerId) -> Result<Vec<Event>, GameError> {
        let (first, second) = self.drawn_faces()?;
        self.state.turn.complete_current();
        Ok(self.resolve_chance(player, first, second))
    }

    fn refuse_chance(&mut self, player: PlayerId) -> Result<Vec<Event>, GameError> {
        self.drawn_faces()?;
        let p = self.active_mut(player)?;
        if p.refusal_to_chance == 0 {
            return Err(GameError::NoRefusalCredit);
        }
        p.refusal_to_chance -= 1;
        let credits = Event::CreditsChanged {
            player,
            refusal_to_pay: p.refusal_to_pay,
            refusal_to_chance: p.refusal_to_chance,
        };
        self.state.turn.complete_current();
        Ok(vec![credits, Event::ChanceRefused { player }])
    }

    fn resolve_chance(&mut self, player: PlayerId, first: DieFace, second: DieFace) -> Vec<Event> {
        let outcome = self.state.apply_chance(player, first, second);
        match outcome.follow_up {
            FollowUp::None => {}
            FollowUp::Prompt {
                awaiting,
                candidates,
            } => self.state.turn.push_front(Action::Prompt {
                awaiting,
                candidates,
            }),
            FollowUp::Queue(action) => self.state.turn.push_front(action),
        }
        outcome.events
    }

    fn buy(&mut self, player: PlayerId, field: FieldIndex) -> Result<Vec<Event>, GameError> {
        self.require_candidate(field)?;
        let def = self
            .state
            .field_def(field)
            .ok_or(GameError::UnknownField(field))?;
        if !def.is_firm() {
            return Err(GameError::NotAFirm(field));
        }
        if self.state.owner_of(field).is_some() {
            return Err(GameError::AlreadyOwned(field));
        }
        let price = def.base_cost();
        let p = self.active(player)?;
        if p.is_sequestered() {
            return Err(GameError::Sequestered);
        }
        if p.balance < price {
            return Err(GameError::NotEnoughMoney {
                needed: price,
                available: p.balance,
            });
        }

        self.state.turn.complete_current();
        let mut events = self.state.adjust_balance(player, -price);
        events.extend(self.state.reassign(&[(field, Some(player))]));
        events.push(Event::FieldBought {
            player,
            field,
            price,
        });
        Ok(events)
    }

    fn forced_sale(&mut self, player: PlayerId, field: FieldIndex) -> Result<Vec<Event>, GameError> {
        self.require_candidate(field)?;
        self.require_owned(player, field)?;
        self.state.turn.complete_current();
        Ok(self.state.sell_field(player, field))
    }

    fn sell(&mut self, player: PlayerId, field: FieldIndex) -> Result<Vec<Event>, GameError> {
        self.require_owned(player, field)?;
        if self.active(player)?.is_sequestered() {
            return Err(GameError::Sequestered);
        }
        Ok(self.state.sell_field(player, field))
    }

    fn sell_monopoly(
        &mut self,
        player: PlayerId,
        monopoly: MonopolyId,
    ) -> Result<Vec<Event>, GameError> {
        let board = Arc::clone(&self.state.board);
        let set = board
            .monopoly(monopoly)
            .ok_or(GameError::UnknownMonopoly)?;
        if complete_owner(set, &self.state.fields) != Some(player) {
            return Err(GameError::MonopolyNotComplete);
        }

        self.state.turn.complete_current();
        let mut events = Vec::new();
        for &field in &set.members {
            events.extend(self.state.sell_field(player, field));
        }
        Ok(events)
    }

    fn exchange(
        &mut self,
        player: PlayerId,
        own: FieldIndex,
        other: FieldIndex,
    ) -> Result<Vec<Event>, GameError> {
        self.require_candidate(other)?;
        self.require_owned(player, own)?;
        let other_player = self
            .state
            .owner_of(other)
            .filter(|&owner| owner != player)
            .ok_or(GameError::InvalidExchange(other))?;

        self.state.turn.complete_current();
        self.active_mut(player)?.in_exchange = false;
        let mut events = self
            .state
            .reassign(&[(own, Some(other_player)), (other, Some(player))]);
        events.push(Event::FieldsExchanged {
            player,
            own,
            other_player,
            other,
        });
        Ok(events)
    }

    fn sacrifice(&mut self, player: PlayerId, field: FieldIndex) -> Result<Vec<Event>, GameError> {
        self.require_candidate(field)?;
        self.require_owned(player, field)?;
        self.state.turn.complete_current();
        Ok(self.state.lose_field(player, field))
    }

    /// Tier the next investment in `field` buys, after checking its sacrifice.
    fn check_investment(
        &self,
        player: PlayerId,
        field: FieldIndex,
        sacrifice: Option<FieldIndex>,
    ) -> Result<InvestmentOption, GameError> {
        let def = self
            .state
            .field_def(field)
            .ok_or(GameError::UnknownField(field))?;
        if !def.is_firm() {
            return Err(GameError::NotAFirm(field));
        }
        self.require_owned(player, field)?;
        if self.active(player)?.invest_income_block.contains(&field) {
            return Err(GameError::FieldBlocked(field));
        }
        let level = self.state.field(field).map_or(0, |f| f.level);
        let tier = *def
            .next_tier(level)
            .ok_or(GameError::NoInvestmentTier(field))?;

        match (tier.kind, sacrifice) {
            (InvestmentKind::Regular | InvestmentKind::Infinite, None) => {}
            (InvestmentKind::Regular | InvestmentKind::Infinite, Some(extra)) => {
                return Err(GameError::InvalidSacrifice(extra));
            }
            (InvestmentKind::SacrificeCompany | InvestmentKind::SacrificeMonopoly, None) => {
                return Err(GameError::SacrificeRequired);
            }
            (InvestmentKind::SacrificeCompany, Some(victim)) => {
                if victim == field || self.state.owner_of(victim) != Some(player) {
                    return Err(GameError::InvalidSacrifice(victim));
                }
            }
            (InvestmentKind::SacrificeMonopoly, Some(victim)) => {
                if victim == field || !self.state.monopoly_fields(player).contains(&victim) {
                    return Err(GameError::InvalidSacrifice(victim));
                }
            }
        }
        Ok(tier)
    }

    fn invest(
        &mut self,
        player: PlayerId,
        field: FieldIndex,
        sacrifice: Option<FieldIndex>,
    ) -> Result<Vec<Event>, GameError> {
        let p = self.active(player)?;
        if p.position != Some(field) {
            return Err(GameError::NotOnField(field));
        }
        if p.is_sequestered() {
            return Err(GameError::Sequestered);
        }
        let balance = p.balance;
        let tier = self.check_investment(player, field, sacrifice)?;
        if balance < tier.cost {
            return Err(GameError::NotEnoughMoney {
                needed: tier.cost,
                available: balance,
            });
        }
        Ok(self.state.apply_investment(player, field, sacrifice, tier.cost))
    }

    fn free_invest(
        &mut self,
        player: PlayerId,
        field: FieldIndex,
        sacrifice: Option<FieldIndex>,
    ) -> Result<Vec<Event>, GameError> {
        self.require_candidate(field)?;
        self.check_investment(player, field, sacrifice)?;
        self.state.turn.complete_current();
        Ok(self.state.apply_investment(player, field, sacrifice, 0))
    }

    fn remove_investment(
        &mut self,
        player: PlayerId,
        field: FieldIndex,
    ) -> Result<Vec<Event>, GameError> {
        self.require_candidate(field)?;
        self.require_owned(player, field)?;
        let state = self
            .state
            .fields
            .get_mut(field.index())
            .ok_or(GameError::UnknownField(field))?;
        if state.level == 0 {
            return Err(GameError::NothingInvested(field));
        }
        state.level -= 1;
        let events = vec![
            Event::FieldChanged { field: *state },
            Event::InvestmentRemoved {
                player,
                field,
                level: state.level,
            },
        ];
        self.state.turn.complete_current();
        Ok(events)
    }

    fn choose_target(
        &mut self,
        player: PlayerId,
        field: FieldIndex,
    ) -> Result<Vec<Event>, GameError> {
        self.require_candidate(field)?;
        self.state.turn.complete_current();
        Ok(self.state.relocate(player, field))
    }

    fn pay_deferred(
        &mut self,
        player: PlayerId,
        field: Option<FieldIndex>,
    ) -> Result<Vec<Event>, GameError> {
        let head = self
            .active(player)?
            .pending_actions
            .front()
            .copied()
            .ok_or(GameError::NoPendingObligation)?;

        match head {
            PendingAction::Payment { to, amount, reason } => {
                self.active_mut(player)?.pending_actions.pop_front();
                if self.state.payment_frozen(player, to) {
                    return Ok(vec![Event::PaymentSuppressed {
                        payer: player,
                        receiver: to,
                        amount,
                        reason,
                    }]);
                }
                Ok(self.state.settle_payment(player, to, amount, reason))
            }
            PendingAction::Loss => {
                if self.state.owned_firms(player).is_empty() {
                    self.active_mut(player)?.pending_actions.pop_front();
                    return Ok(Vec::new());
                }
                let field = field.ok_or(GameError::FieldRequired)?;
                self.require_owned(player, field)?;
                self.active_mut(player)?.pending_actions.pop_front();
                Ok(self.state.lose_field(player, field))
            }
        }
    }

    fn refuse_deferred(&mut self, player: PlayerId) -> Result<Vec<Event>, GameError> {
        let p = self.active_mut(player)?;
        let head = p
            .pending_actions
            .front()
            .copied()
            .ok_or(GameError::NoPendingObligation)?;
        if p.refusal_to_pay == 0 {
            return Err(GameError::NoRefusalCredit);
        }
        p.refusal_to_pay -= 1;
        p.pending_actions.pop_front();

        let mut events = vec![Event::CreditsChanged {
            player,
            refusal_to_pay: p.refusal_to_pay,
            refusal_to_chance: p.refusal_to_chance,
        }];
        if let PendingAction::Payment { to, amount, .. } = head {
            events.push(Event::PaymentRefused {
                payer: player,
                receiver: to,
                amount,
            });
        }
        Ok(events)
    }

    fn decline(&mut self, player: PlayerId) -> Vec<Event> {
        if self.state.turn.awaiting() == Awaiting::WaitingChange {
            if let Some(p) = self.state.player_mut(player) {
                p.in_exchange = false;
            }
        }
        self.state.turn.complete_current();
        Vec::new()
    }

    fn claim_income(
        &mut self,
        player: PlayerId,
        field: FieldIndex,
    ) -> Result<Vec<Event>, GameError> {
        let p = self.active(player)?;
        if p.position != Some(field) {
            return Err(GameError::NotOnField(field));
        }
        if p.invest_income_block.contains(&field) {
            return Err(GameError::FieldBlocked(field));
        }
        let sequestered = p.is_sequestered();
        self.require_owned(player, field)?;

        let amount = field_income(&self.state.board, field, &self.state.fields);
        self.active_mut(player)?.invest_income_block.insert(field);
        let mut events = self.state.receive_from_bank(player, amount);
        if !sequestered {
            events.push(Event::IncomeClaimed {
                player,
                field,
                amount,
            });
        }
        Ok(events)
    }
}

impl GameState {
    /// Walk `steps` cells, pay the start and pass bonuses crossed and resolve the landing.
    pub fn perform_move(
        &mut self,
        id: PlayerId,
        steps: u8,
        backward: bool,
        prefer_center: bool,
    ) -> Result<Vec<Event>, MoveError> {
        let Some((from, direction)) = self
            .player(id)
            .filter(|p| !p.is_bankrupt)
            .and_then(|p| p.position.map(|at| (at, p.direction)))
        else {
            return Ok(Vec::new());
        };
        let mv = compute_path(from, steps, backward, prefer_center, direction)?;
        let Some(destination) = mv.destination() else {
            return Ok(Vec::new());
        };

        if let Some(p) = self.player_mut(id) {
            p.position = Some(destination);
            p.direction = if destination == FieldIndex::START {
                None
            } else {
                mv.exit_direction
            };
            if mv.turned_to_center {
                p.turn_to_start = p.turn_to_start.saturating_sub(1);
            }
        }
        debug!(player = %id, from = %from, to = %destination, steps, backward, "moved");

        let mut events = vec![Event::Moved {
            player: id,
            path: mv.path.clone(),
            rest: true,
            turned_to_center: mv.turned_to_center,
            passed_start: mv.passed_start,
        }];
        if mv.passed_start {
            events.extend(self.start_bonus(id));
        }
        let pass_cells: Vec<FieldIndex> = mv
            .path
            .iter()
            .copied()
            .filter(|&cell| {
                self.field_def(cell)
                    .is_some_and(|def| def.kind == FieldKind::PassBonus)
            })
            .collect();
        for field in pass_cells {
            let amount = self.economy.pass_bonus;
            events.push(Event::PassBonus {
                player: id,
                field,
                amount,
            });
            events.extend(self.receive_from_bank(id, amount));
        }
        events.extend(self.land(id, destination));
        Ok(events)
    }

    fn start_bonus(&mut self, id: PlayerId) -> Vec<Event> {
        let base = self.economy.start_bonus;
        let Some(p) = self.player_mut(id) else {
            return Vec::new();
        };
        let amount = match p.plus_start.cmp(&0) {
            Ordering::Greater => {
                p.plus_start -= 1;
                base * 2
            }
            Ordering::Less => {
                p.plus_start += 1;
                0
            }
            Ordering::Equal => base,
        };
        let mut events = vec![Event::StartBonus { player: id, amount }];
        events.extend(self.receive_from_bank(id, amount));
        events
    }

    /// Effects of coming to rest on `cell`. Decisions are queued on the current turn.
    pub(crate) fn land(&mut self, id: PlayerId, cell: FieldIndex) -> Vec<Event> {
        let Some(kind) = self.field_def(cell).map(|def| def.kind) else {
            return Vec::new();
        };
        match kind {
            FieldKind::Firm => match self.owner_of(cell) {
                None => {
                    if self.player(id).is_some_and(|p| !p.is_sequestered()) {
                        self.turn.push_front(Action::Prompt {
                            awaiting: Awaiting::WaitingBuy,
                            candidates: vec![cell],
                        });
                    }
                    Vec::new()
                }
                Some(owner) if owner != id => {
                    let rent = field_income(&self.board, cell, &self.fields);
                    self.request_payment(id, Some(owner), rent, PaymentReason::Rent { field: cell })
                }
                Some(_) => Vec::new(),
            },
            FieldKind::Chance | FieldKind::SingleChance => {
                self.turn.push_front(Action::DrawChance);
                Vec::new()
            }
            FieldKind::Jail => match self.player_mut(id) {
                Some(p) => {
                    p.in_jail = true;
                    vec![Event::JailEntered { player: id }]
                }
                None => Vec::new(),
            },
            FieldKind::Taxi => match self.player_mut(id) {
                Some(p) => {
                    p.in_taxi = true;
                    vec![Event::TaxiEntered { player: id }]
                }
                None => Vec::new(),
            },
            FieldKind::Exchange => {
                if let Some(p) = self.player_mut(id) {
                    p.in_exchange = true;
                }
                let targets = self.exchange_targets(id);
                if !self.owned_firms(id).is_empty() && !targets.is_empty() {
                    self.turn.push_front(Action::Prompt {
                        awaiting: Awaiting::WaitingChange,
                        candidates: targets,
                    });
                }
                Vec::new()
            }
            FieldKind::Start | FieldKind::PassBonus => Vec::new(),
        }
    }

    /// Sell `field` back to the bank for half its invested value.
    pub fn sell_field(&mut self, player: PlayerId, field: FieldIndex) -> Vec<Event> {
        let price = self.sale_value(field);
        let mut events = self.reassign(&[(field, None)]);
        events.extend(self.receive_from_bank(player, price));
        events.push(Event::FieldSold {
            player,
            field,
            price,
        });
        events
    }

    /// Give `field` up without compensation.
    pub fn lose_field(&mut self, player: PlayerId, field: FieldIndex) -> Vec<Event> {
        let mut events = self.reassign(&[(field, None)]);
        events.push(Event::FieldLost { player, field });
        events
    }

    pub(crate) fn apply_investment(
        &mut self,
        player: PlayerId,
        field: FieldIndex,
        sacrifice: Option<FieldIndex>,
        cost: Money,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        if cost > 0 {
            events.extend(self.adjust_balance(player, -cost));
        }
        if let Some(victim) = sacrifice {
            events.extend(self.lose_field(player, victim));
        }
        if let Some(state) = self.fields.get_mut(field.index()) {
            state.level += 1;
            events.push(Event::FieldChanged { field: *state });
            events.push(Event::Invested {
                player,
                field,
                level: state.level,
                cost,
            });
        }
        if let Some(p) = self.player_mut(player) {
            p.invest_income_block.insert(field);
        }
        events
    }
}
