//! Payments, voluntary deferral and bankruptcy.

use crosstown_protocol::{Event, Money, PaymentReason, PendingAction, PlayerId};
use tracing::{debug, info};

use crate::state::GameState;

impl GameState {
    /// Cash plus the purchase price of every owned firm.
    pub fn total_assets(&self, id: PlayerId) -> Money {
        let Some(player) = self.player(id) else {
            return 0;
        };
        let holdings: Money = self
            .owned_firms(id)
            .into_iter()
            .filter_map(|f| self.field_def(f))
            .map(|def| def.base_cost())
            .sum();
        player.balance + holdings
    }

    /// Ask `payer` to pay. Freezes suppress the transfer and each refusal-to-pay credit defers at
    /// most one obligation.
    pub fn request_payment(
        &mut self,
        payer: PlayerId,
        receiver: Option<PlayerId>,
        amount: Money,
        reason: PaymentReason,
    ) -> Vec<Event> {
        let Some(from) = self.player(payer) else {
            return Vec::new();
        };
        if from.is_bankrupt || amount <= 0 {
            return Vec::new();
        }

        if self.payment_frozen(payer, receiver) {
            debug!(?payer, ?receiver, amount, "payment suppressed by sequester");
            return vec![Event::PaymentSuppressed {
                payer,
                receiver,
                amount,
                reason,
            }];
        }

        if from.can_defer() {
            if let Some(from) = self.player_mut(payer) {
                from.pending_actions.push_back(PendingAction::Payment {
                    to: receiver,
                    amount,
                    reason,
                });
            }
            return vec![Event::PaymentDeferred {
                payer,
                receiver,
                amount,
                reason,
            }];
        }

        self.settle_payment(payer, receiver, amount, reason)
    }

    /// Move the money now. A payer who cannot cover `amount` with all assets goes bankrupt and the
    /// receiver collects only what the payer had.
    pub fn settle_payment(
        &mut self,
        payer: PlayerId,
        receiver: Option<PlayerId>,
        amount: Money,
        reason: PaymentReason,
    ) -> Vec<Event> {
        let Some(from) = self.player(payer) else {
            return Vec::new();
        };
        if from.is_bankrupt {
            return Vec::new();
        }

        let assets = self.total_assets(payer);
        let mut events = Vec::new();
        let paid = if amount <= assets {
            events.extend(self.adjust_balance(payer, -amount));
            amount
        } else {
            events.extend(self.declare_bankrupt(payer));
            assets.max(0)
        };

        // A bankrupt receiver is treated as the bank.
        let receiver = receiver.filter(|r| self.player(*r).is_some_and(|p| !p.is_bankrupt));
        if let Some(to) = receiver {
            events.extend(self.adjust_balance(to, paid));
        }
        events.push(Event::PaymentSettled {
            payer,
            receiver,
            amount: paid,
            reason,
        });
        events
    }

    /// Whether a sequester on either side blocks a transfer.
    pub fn payment_frozen(&self, payer: PlayerId, receiver: Option<PlayerId>) -> bool {
        [Some(payer), receiver]
            .into_iter()
            .flatten()
            .filter_map(|id| self.player(id))
            .any(|p| p.is_sequestered())
    }

    /// Money from the bank; withheld while the player is sequestered.
    pub fn receive_from_bank(&mut self, id: PlayerId, amount: Money) -> Vec<Event> {
        let Some(player) = self.player(id) else {
            return Vec::new();
        };
        if player.is_bankrupt || amount <= 0 {
            return Vec::new();
        }
        if player.is_sequestered() {
            return vec![Event::IncomeSuppressed { player: id, amount }];
        }
        self.adjust_balance(id, amount)
    }

    pub(crate) fn adjust_balance(&mut self, id: PlayerId, delta: Money) -> Vec<Event> {
        let Some(player) = self.player_mut(id) else {
            return Vec::new();
        };
        player.balance += delta;
        vec![Event::BalanceChanged {
            player: id,
            delta,
            balance: player.balance,
        }]
    }

    /// Release every firm, zero the balance and drop all deferred obligations.
    pub fn declare_bankrupt(&mut self, id: PlayerId) -> Vec<Event> {
        let released: Vec<_> = self
            .owned_firms(id)
            .into_iter()
            .map(|f| (f, None))
            .collect();
        let mut events = self.reassign(&released);

        let Some(player) = self.player_mut(id) else {
            return events;
        };
        let delta = -player.balance;
        player.balance = 0;
        player.is_bankrupt = true;
        player.pending_actions.clear();
        player.invest_income_block.clear();
        player.position = None;
        player.direction = None;
        player.in_jail = false;
        player.in_taxi = false;
        player.in_exchange = false;
        player.sequester = 0;

        info!(player = %id, fields = released.len(), "player bankrupt");
        if delta != 0 {
            events.push(Event::BalanceChanged {
                player: id,
                delta,
                balance: 0,
            });
        }
        events.push(Event::Bankrupt { player: id });
        events
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use crosstown_protocol::{FieldIndex, FieldState};

    use super::*;
    use crate::board::{load_board, BoardSource};
    use crate::rng::GameRng;
    use crate::state::{EconomyConfig, Player, Seat};
    use crate::turn::TurnState;

    const A: PlayerId = PlayerId(0);
    const B: PlayerId = PlayerId(1);

    fn state() -> GameState {
        let board = Arc::new(load_board(BoardSource::Embedded).unwrap());
        let players = [A, B]
            .into_iter()
            .map(|id| {
                Player::new(
                    Seat {
                        id,
                        name: format!("{id}"),
                        color: "red".into(),
                    },
                    10_000,
                )
            })
            .collect();
        GameState {
            board,
            economy: EconomyConfig::default(),
            players,
            fields: (0..FieldIndex::COUNT as u8)
                .map(|i| FieldState::unowned(FieldIndex(i)))
                .collect(),
            turn: TurnState::new(A),
            round: 1,
            rng: GameRng::seed_from_u64(1),
            scripted_dice: VecDeque::new(),
            winner: None,
            game_over: false,
        }
    }

    const RENT: PaymentReason = PaymentReason::Rent {
        field: FieldIndex(3),
    };

    fn balance(s: &GameState, id: PlayerId) -> Money {
        s.player(id).unwrap().balance
    }

    #[test]
    fn exact_total_assets_is_paid_in_full() {
        let mut s = state();
        s.fields[1].owner = Some(A);
        let assets = s.total_assets(A);
        assert_eq!(assets, 10_000 + s.field_def(FieldIndex(1)).unwrap().base_cost());

        s.settle_payment(A, Some(B), assets, RENT);
        let a = s.player(A).unwrap();
        assert!(!a.is_bankrupt);
        assert_eq!(a.balance, 10_000 - assets);
        assert_eq!(s.owner_of(FieldIndex(1)), Some(A));
        assert_eq!(balance(&s, B), 10_000 + assets);
    }

    #[test]
    fn one_cent_over_bankrupts_with_capped_transfer() {
        let mut s = state();
        s.fields[1].owner = Some(A);
        s.fields[1].level = 2;
        let assets = s.total_assets(A);

        let events = s.settle_payment(A, Some(B), assets + 1, RENT);
        let a = s.player(A).unwrap();
        assert!(a.is_bankrupt);
        assert_eq!(a.balance, 0);
        assert!(a.pending_actions.is_empty());
        assert_eq!(s.field(FieldIndex(1)), Some(&FieldState::unowned(FieldIndex(1))));
        assert_eq!(balance(&s, B), 10_000 + assets);
        assert!(events.contains(&Event::Bankrupt { player: A }));
    }

    #[test]
    fn settling_against_bankrupt_payer_is_idempotent() {
        let mut s = state();
        s.settle_payment(A, Some(B), 1_000_000, RENT);
        let b_after_first = balance(&s, B);

        let events = s.settle_payment(A, Some(B), 1_000_000, RENT);
        assert!(events.is_empty());
        assert_eq!(balance(&s, A), 0);
        assert!(s.owned_firms(A).is_empty());
        assert_eq!(balance(&s, B), b_after_first);

        assert!(s.request_payment(A, Some(B), 10, RENT).is_empty());
    }

    #[test]
    fn sequester_suppresses_both_directions() {
        let mut s = state();
        s.player_mut(B).unwrap().sequester = 2;
        let events = s.request_payment(A, Some(B), 500, RENT);
        assert!(matches!(events.as_slice(), [Event::PaymentSuppressed { .. }]));
        assert_eq!(balance(&s, A), 10_000);

        let events = s.receive_from_bank(B, 500);
        assert!(matches!(events.as_slice(), [Event::IncomeSuppressed { .. }]));
        assert_eq!(balance(&s, B), 10_000);
    }

    #[test]
    fn refusal_credit_defers_without_consuming() {
        let mut s = state();
        s.player_mut(A).unwrap().refusal_to_pay = 1;
        let events = s.request_payment(A, Some(B), 700, RENT);
        assert!(matches!(events.as_slice(), [Event::PaymentDeferred { .. }]));

        let a = s.player(A).unwrap();
        assert_eq!(a.refusal_to_pay, 1);
        assert_eq!(a.balance, 10_000);
        assert_eq!(
            a.pending_actions.front(),
            Some(&PendingAction::Payment {
                to: Some(B),
                amount: 700,
                reason: RENT
            })
        );
    }

    #[test]
    fn one_credit_defers_one_obligation() {
        let mut s = state();
        s.player_mut(A).unwrap().refusal_to_pay = 1;
        s.request_payment(A, Some(B), 700, RENT);

        let events = s.request_payment(A, Some(B), 300, RENT);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::PaymentSettled { amount: 300, .. })));
        s.request_payment(A, None, 200, PaymentReason::TaxiFare);

        let a = s.player(A).unwrap();
        assert_eq!(a.pending_actions.len(), 1);
        assert_eq!(a.balance, 10_000 - 500);
        assert_eq!(balance(&s, B), 10_000 + 300);

        s.player_mut(A).unwrap().refusal_to_pay = 2;
        s.request_payment(A, Some(B), 100, RENT);
        assert_eq!(s.player(A).unwrap().pending_actions.len(), 2);
    }

    #[test]
    fn balance_may_go_negative_while_assets_cover() {
        let mut s = state();
        s.fields[3].owner = Some(A);
        s.settle_payment(A, None, 10_500, RENT);
        assert_eq!(balance(&s, A), -500);
        assert!(!s.player(A).unwrap().is_bankrupt);
    }
}
