//! Per-turn action queue and the await state machine that sequences it.

use std::collections::VecDeque;

use crosstown_protocol::{Awaiting, FieldIndex, PlayerId};

use crate::state::Player;

/// A unit of work queued within one turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// `steps: None` asks for a dice roll.
    Move { backward: bool, steps: Option<u8> },
    /// Two chance dice; adverse draws may be refused with a credit.
    DrawChance,
    /// A decision the player owes before the turn may continue.
    Prompt {
        awaiting: Awaiting,
        candidates: Vec<FieldIndex>,
    },
}

/// What the engine should do after [`TurnState::advance`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Await(Awaiting),
    /// Run without player input.
    Execute(Action),
    /// The queue ran dry; returned once per turn.
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnState {
    player: PlayerId,
    queue: VecDeque<Action>,
    current: Option<Action>,
    awaiting: Awaiting,
    closed: bool,
    /// Dice total held while the player decides whether to turn toward the center.
    pub(crate) pending_steps: Option<u8>,
    pub(crate) first_die: Option<u8>,
    /// Chance faces held while the player decides whether to refuse.
    pub(crate) drawn: Option<(u8, u8)>,
}

impl TurnState {
    pub fn new(player: PlayerId) -> Self {
        Self {
            player,
            queue: VecDeque::from([Action::Move {
                backward: false,
                steps: None,
            }]),
            current: None,
            awaiting: Awaiting::Nothing,
            closed: false,
            pending_steps: None,
            first_die: None,
            drawn: None,
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn awaiting(&self) -> Awaiting {
        self.awaiting
    }

    pub fn current(&self) -> Option<&Action> {
        self.current.as_ref()
    }

    /// Legal targets of the prompt in progress.
    pub fn candidates(&self) -> &[FieldIndex] {
        match &self.current {
            Some(Action::Prompt { candidates, .. }) => candidates,
            _ => &[],
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run `action` before anything already queued.
    pub fn push_front(&mut self, action: Action) {
        self.queue.push_front(action);
    }

    pub fn push_back(&mut self, action: Action) {
        self.queue.push_back(action);
    }

    /// Finish the action in progress and forget its partial input.
    pub fn complete_current(&mut self) -> Option<Action> {
        self.pending_steps = None;
        self.first_die = None;
        self.drawn = None;
        self.awaiting = Awaiting::Nothing;
        self.current.take()
    }

    /// Move to the next wait condition.
    pub fn advance(&mut self, player: &Player) -> Step {
        if let Some(action) = self.current.clone() {
            return self.evaluate(action, player);
        }
        if !player.pending_actions.is_empty() {
            return self.wait(Awaiting::WaitingPendingPaymentOrLoss);
        }
        if let Some(action) = self.queue.pop_front() {
            self.current = Some(action.clone());
            return self.evaluate(action, player);
        }

        self.awaiting = Awaiting::TurnEnded;
        if self.closed {
            Step::Await(Awaiting::TurnEnded)
        } else {
            self.closed = true;
            Step::Closed
        }
    }

    fn evaluate(&mut self, action: Action, player: &Player) -> Step {
        match action {
            Action::Move { steps, .. } => {
                if player.position == Some(FieldIndex::START) && player.direction.is_none() {
                    self.wait(Awaiting::WaitingDirectionAtCenter)
                } else if player.in_jail || player.in_taxi {
                    self.wait(Awaiting::WaitingJailOrTaxiDecision)
                } else if self.pending_steps.is_some() {
                    self.wait(Awaiting::WaitingGoOrStay)
                } else if steps.is_some() {
                    self.awaiting = Awaiting::Nothing;
                    Step::Execute(action)
                } else {
                    self.wait(Awaiting::WaitingDiceRoll)
                }
            }
            Action::DrawChance => {
                if self.drawn.is_some() {
                    self.wait(Awaiting::WaitingChanceDecision)
                } else if self.first_die.is_some() {
                    self.wait(Awaiting::WaitingSecondChanceDie)
                } else {
                    self.wait(Awaiting::WaitingFirstChanceDie)
                }
            }
            Action::Prompt { awaiting, .. } => self.wait(awaiting),
        }
    }

    fn wait(&mut self, awaiting: Awaiting) -> Step {
        self.awaiting = awaiting;
        Step::Await(awaiting)
    }
}

#[cfg(test)]
mod tests {
    use crosstown_protocol::{Direction, Money, PendingAction};

    use super::*;
    use crate::state::Seat;

    fn player() -> Player {
        Player::new(
            Seat {
                id: PlayerId(0),
                name: "Ana".into(),
                color: "blue".into(),
            },
            1_000 as Money,
        )
    }

    #[test]
    fn center_without_direction_asks_for_direction_before_dice() {
        let mut p = player();
        let mut turn = TurnState::new(p.id);
        assert_eq!(turn.awaiting(), Awaiting::Nothing);
        assert_eq!(
            turn.advance(&p),
            Step::Await(Awaiting::WaitingDirectionAtCenter)
        );

        p.direction = Some(Direction::Up);
        assert_eq!(turn.advance(&p), Step::Await(Awaiting::WaitingDiceRoll));
    }

    #[test]
    fn jailed_player_decides_before_rolling() {
        let mut p = player();
        p.position = Some(FieldIndex(10));
        p.in_jail = true;
        let mut turn = TurnState::new(p.id);
        assert_eq!(
            turn.advance(&p),
            Step::Await(Awaiting::WaitingJailOrTaxiDecision)
        );
    }

    #[test]
    fn fixed_step_move_executes_without_input() {
        let mut p = player();
        p.position = Some(FieldIndex(3));
        let mut turn = TurnState::new(p.id);
        turn.complete_current();
        turn.queue.clear();
        turn.push_front(Action::Move {
            backward: true,
            steps: Some(3),
        });
        assert_eq!(
            turn.advance(&p),
            Step::Execute(Action::Move {
                backward: true,
                steps: Some(3)
            })
        );
    }

    #[test]
    fn chance_draw_walks_both_dice() {
        let mut p = player();
        p.position = Some(FieldIndex(2));
        let mut turn = TurnState::new(p.id);
        turn.queue.clear();
        turn.push_back(Action::DrawChance);

        assert_eq!(turn.advance(&p), Step::Await(Awaiting::WaitingFirstChanceDie));
        turn.first_die = Some(4);
        assert_eq!(turn.advance(&p), Step::Await(Awaiting::WaitingSecondChanceDie));
        turn.drawn = Some((4, 2));
        assert_eq!(turn.advance(&p), Step::Await(Awaiting::WaitingChanceDecision));
    }

    #[test]
    fn turn_closes_exactly_once() {
        let mut p = player();
        p.position = Some(FieldIndex(7));
        let mut turn = TurnState::new(p.id);
        turn.queue.clear();

        assert_eq!(turn.advance(&p), Step::Closed);
        assert!(turn.is_closed());
        assert_eq!(turn.advance(&p), Step::Await(Awaiting::TurnEnded));
        assert_eq!(turn.advance(&p), Step::Await(Awaiting::TurnEnded));
    }

    #[test]
    fn pending_obligations_block_the_queue() {
        let mut p = player();
        p.position = Some(FieldIndex(7));
        p.pending_actions.push_back(PendingAction::Loss);
        let mut turn = TurnState::new(p.id);
        assert_eq!(
            turn.advance(&p),
            Step::Await(Awaiting::WaitingPendingPaymentOrLoss)
        );
        assert_eq!(turn.queued(), 1);

        p.pending_actions.clear();
        assert_eq!(turn.advance(&p), Step::Await(Awaiting::WaitingDiceRoll));
    }

    #[test]
    fn prompt_exposes_candidates() {
        let p = player();
        let mut turn = TurnState::new(p.id);
        turn.queue.clear();
        turn.push_front(Action::Prompt {
            awaiting: Awaiting::WaitingBuy,
            candidates: vec![FieldIndex(3)],
        });
        assert_eq!(turn.advance(&p), Step::Await(Awaiting::WaitingBuy));
        assert_eq!(turn.candidates(), &[FieldIndex(3)]);
        turn.complete_current();
        assert!(turn.candidates().is_empty());
    }
}
