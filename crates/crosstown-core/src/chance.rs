//! The 6×6 chance table and its effects.
//!
//! Entries are plain data; [`GameState::apply_chance`] interprets them and reports any choice the
//! player still owes as a [`FollowUp`].

use crosstown_protocol::{
    Awaiting, Event, FieldIndex, FieldKind, Money, PaymentReason, PendingAction, PlayerId,
    PositionChoice,
};
use tracing::debug;

use crate::movement::{inward_direction, ENTRIES};
use crate::state::{GameState, Player};
use crate::turn::Action;

/// One face of a six-sided die.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DieFace(u8);

impl DieFace {
    pub const fn new(face: u8) -> Option<Self> {
        if face >= 1 && face <= 6 {
            Some(Self(face))
        } else {
            None
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    const fn slot(self) -> usize {
        self.0 as usize - 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChanceEffect {
    /// Positive from the bank, negative to the bank.
    Money(Money),
    /// Every other player pays the drawer.
    CollectFromEach(Money),
    /// The drawer pays every other player.
    PayEach(Money),
    Step { backward: bool, steps: u8 },
    RollAgain { backward: bool },
    Detour,
    ExtraDraw,
    GrantRefusalToPay,
    GrantRefusalToChance,
    /// Lose one refusal credit, payment credits first.
    LoseRefusal,
    PlusStart(i32),
    BuyFree,
    ForcedSale,
    SellMonopoly,
    Exchange,
    Sacrifice,
    FreeInvest,
    GoTo(FieldKind),
    ChoosePosition(PositionChoice),
    RemoveInvestment,
    Sequester(u32),
    /// Per owned firm; signed like `Money`.
    PerFirm(Money),
    /// Applied to every solvent player; signed like `Money`.
    Everyone(Money),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChanceEntry {
    pub label: &'static str,
    pub adverse: bool,
    pub effect: ChanceEffect,
}

const fn entry(label: &'static str, adverse: bool, effect: ChanceEffect) -> ChanceEntry {
    ChanceEntry {
        label,
        adverse,
        effect,
    }
}

const fn units(amount: Money) -> Money {
    amount * 100
}

use ChanceEffect as E;

/// Row: first die. Column: second die.
pub const CHANCE_TABLE: [[ChanceEntry; 6]; 6] = [
    [
        entry("Dividend", false, E::Money(units(1_000))),
        entry("Tax audit", true, E::Money(-units(1_000))),
        entry("Inheritance", false, E::Money(units(2_500))),
        entry("Fine", true, E::Money(-units(1_500))),
        entry("Birthday", false, E::CollectFromEach(units(500))),
        entry("Charity", true, E::PayEach(units(500))),
    ],
    [
        entry("Forward three", false, E::Step { backward: false, steps: 3 }),
        entry("Back three", true, E::Step { backward: true, steps: 3 }),
        entry("Roll again", false, E::RollAgain { backward: false }),
        entry("Roll backward", true, E::RollAgain { backward: true }),
        entry("Detour to the center", false, E::Detour),
        entry("Forward six", false, E::Step { backward: false, steps: 6 }),
    ],
    [
        entry("Extra draw", false, E::ExtraDraw),
        entry("Refusal to pay", false, E::GrantRefusalToPay),
        entry("Refusal to chance", false, E::GrantRefusalToChance),
        entry("Lose a refusal", true, E::LoseRefusal),
        entry("Double start bonus", false, E::PlusStart(1)),
        entry("Lose start bonus", true, E::PlusStart(-1)),
    ],
    [
        entry("Buy any free firm", false, E::BuyFree),
        entry("Forced sale", true, E::ForcedSale),
        entry("Sell a monopoly", true, E::SellMonopoly),
        entry("Exchange", false, E::Exchange),
        entry("Sacrifice", true, E::Sacrifice),
        entry("Free investment", false, E::FreeInvest),
    ],
    [
        entry("Go to jail", true, E::GoTo(FieldKind::Jail)),
        entry("Take the taxi", true, E::GoTo(FieldKind::Taxi)),
        entry("Cross", false, E::ChoosePosition(PositionChoice::Cross)),
        entry("Perimeter", false, E::ChoosePosition(PositionChoice::Perimeter)),
        entry("Between start", false, E::ChoosePosition(PositionChoice::BetweenStart)),
        entry("Remove an investment", true, E::RemoveInvestment),
    ],
    [
        entry("Sequester", true, E::Sequester(2)),
        entry("Property tax", true, E::PerFirm(-units(200))),
        entry("Firm dividend", false, E::PerFirm(units(100))),
        entry("Bank levy", true, E::Everyone(-units(300))),
        entry("Bank bonus", false, E::Everyone(units(500))),
        entry("Jackpot", false, E::Money(units(5_000))),
    ],
];

pub fn chance_entry(first: DieFace, second: DieFace) -> &'static ChanceEntry {
    &CHANCE_TABLE[first.slot()][second.slot()]
}

/// What the turn must do after an effect was applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FollowUp {
    None,
    Prompt {
        awaiting: Awaiting,
        candidates: Vec<FieldIndex>,
    },
    Queue(Action),
}

impl FollowUp {
    fn prompt(awaiting: Awaiting, candidates: Vec<FieldIndex>) -> Self {
        if candidates.is_empty() {
            FollowUp::None
        } else {
            FollowUp::Prompt {
                awaiting,
                candidates,
            }
        }
    }

    /// Whether the turn has to wait on the player.
    pub fn needs_input(&self) -> bool {
        !matches!(self, FollowUp::None)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChanceOutcome {
    pub events: Vec<Event>,
    pub follow_up: FollowUp,
}

impl ChanceOutcome {
    fn done(events: Vec<Event>) -> Self {
        Self {
            events,
            follow_up: FollowUp::None,
        }
    }
}

/// Cells a relocation of `choice` may target.
pub fn position_candidates(choice: PositionChoice) -> Vec<FieldIndex> {
    match choice {
        PositionChoice::Cross => ENTRIES.to_vec(),
        PositionChoice::Perimeter => (0..FieldIndex::RING_LEN).map(FieldIndex).collect(),
        PositionChoice::BetweenStart => (FieldIndex::RING_LEN..FieldIndex::COUNT as u8)
            .map(FieldIndex)
            .filter(|&cell| cell != FieldIndex::START)
            .collect(),
    }
}

impl GameState {
    /// Apply the entry at (`first`, `second`) for `player`.
    pub fn apply_chance(
        &mut self,
        player: PlayerId,
        first: DieFace,
        second: DieFace,
    ) -> ChanceOutcome {
        let entry = chance_entry(first, second);
        debug!(
            %player,
            first = first.get(),
            second = second.get(),
            label = entry.label,
            "chance applied"
        );
        let reason = PaymentReason::Chance {
            first: first.get(),
            second: second.get(),
        };

        let mut events = Vec::new();
        let follow_up = match entry.effect {
            E::Money(amount) if amount >= 0 => {
                events.extend(self.receive_from_bank(player, amount));
                FollowUp::None
            }
            E::Money(amount) => {
                events.extend(self.request_payment(player, None, -amount, reason));
                FollowUp::None
            }
            E::CollectFromEach(amount) => {
                for other in self.others(player) {
                    events.extend(self.request_payment(other, Some(player), amount, reason));
                }
                FollowUp::None
            }
            E::PayEach(amount) => {
                for other in self.others(player) {
                    events.extend(self.request_payment(player, Some(other), amount, reason));
                }
                FollowUp::None
            }
            E::Step { backward, steps } => FollowUp::Queue(Action::Move {
                backward,
                steps: Some(steps),
            }),
            E::RollAgain { backward } => FollowUp::Queue(Action::Move {
                backward,
                steps: None,
            }),
            E::Detour => {
                if let Some(p) = self.player_mut(player) {
                    p.turn_to_start += 1;
                }
                FollowUp::None
            }
            E::ExtraDraw => FollowUp::Queue(Action::DrawChance),
            E::GrantRefusalToPay => {
                events.extend(self.adjust_credits(player, |p| p.refusal_to_pay += 1));
                FollowUp::None
            }
            E::GrantRefusalToChance => {
                events.extend(self.adjust_credits(player, |p| p.refusal_to_chance += 1));
                FollowUp::None
            }
            E::LoseRefusal => {
                events.extend(self.adjust_credits(player, |p| {
                    if p.refusal_to_pay > 0 {
                        p.refusal_to_pay -= 1;
                    } else {
                        p.refusal_to_chance = p.refusal_to_chance.saturating_sub(1);
                    }
                }));
                FollowUp::None
            }
            E::PlusStart(delta) => {
                if let Some(p) = self.player_mut(player) {
                    p.plus_start += delta;
                }
                FollowUp::None
            }
            E::BuyFree => FollowUp::prompt(Awaiting::WaitingBuy, self.free_firms()),
            E::ForcedSale => FollowUp::prompt(Awaiting::WaitingSell, self.owned_firms(player)),
            E::SellMonopoly => {
                FollowUp::prompt(Awaiting::WaitingSellMonopoly, self.monopoly_fields(player))
            }
            E::Exchange => {
                let others = self.exchange_targets(player);
                if self.owned_firms(player).is_empty() {
                    FollowUp::None
                } else {
                    FollowUp::prompt(Awaiting::WaitingChange, others)
                }
            }
            E::Sacrifice => self.sacrifice(player, &mut events),
            E::FreeInvest => {
                let upgradable = self.upgradable_firms(player);
                FollowUp::prompt(Awaiting::WaitingInvestFree, upgradable)
            }
            E::GoTo(kind) => {
                if let Some(cell) = self.cell_of_kind(kind) {
                    events.extend(self.relocate(player, cell));
                }
                FollowUp::None
            }
            E::ChoosePosition(choice) => FollowUp::prompt(
                Awaiting::WaitingPositionChoice { choice },
                position_candidates(choice),
            ),
            E::RemoveInvestment => {
                let invested = self
                    .owned_firms(player)
                    .into_iter()
                    .filter(|f| self.field(*f).is_some_and(|s| s.level > 0))
                    .collect();
                FollowUp::prompt(Awaiting::WaitingRemoveInvest, invested)
            }
            E::Sequester(turns) => {
                if let Some(p) = self.player_mut(player) {
                    p.sequester = p.sequester.max(turns);
                    events.push(Event::Sequestered {
                        player,
                        turns: p.sequester,
                    });
                }
                FollowUp::None
            }
            E::PerFirm(amount) => {
                let total = amount * self.owned_firms(player).len() as Money;
                if total >= 0 {
                    events.extend(self.receive_from_bank(player, total));
                } else {
                    events.extend(self.request_payment(player, None, -total, reason));
                }
                FollowUp::None
            }
            E::Everyone(amount) => {
                for id in self.solvent_players() {
                    if amount >= 0 {
                        events.extend(self.receive_from_bank(id, amount));
                    } else {
                        events.extend(self.request_payment(id, None, -amount, reason));
                    }
                }
                FollowUp::None
            }
        };

        ChanceOutcome { events, follow_up }
    }

    fn others(&self, player: PlayerId) -> Vec<PlayerId> {
        self.solvent_players()
            .into_iter()
            .filter(|&id| id != player)
            .collect()
    }

    /// Firms held by other solvent players.
    pub(crate) fn exchange_targets(&self, player: PlayerId) -> Vec<FieldIndex> {
        self.others(player)
            .into_iter()
            .flat_map(|other| self.owned_firms(other))
            .collect()
    }

    /// Owned firms that still have a tier to invest in.
    pub(crate) fn upgradable_firms(&self, player: PlayerId) -> Vec<FieldIndex> {
        self.owned_firms(player)
            .into_iter()
            .filter(|&f| {
                let level = self.field(f).map_or(0, |s| s.level);
                self.field_def(f)
                    .is_some_and(|def| def.next_tier(level).is_some())
            })
            .collect()
    }

    fn sacrifice(&mut self, player: PlayerId, events: &mut Vec<Event>) -> FollowUp {
        let owned = self.owned_firms(player);
        if owned.is_empty() {
            return FollowUp::None;
        }
        let Some(p) = self.player_mut(player) else {
            return FollowUp::None;
        };
        if p.can_defer() {
            p.pending_actions.push_back(PendingAction::Loss);
            events.push(Event::LossDeferred { player });
            return FollowUp::None;
        }
        FollowUp::prompt(Awaiting::WaitingSacrifice, owned)
    }

    fn adjust_credits(&mut self, id: PlayerId, change: impl FnOnce(&mut Player)) -> Vec<Event> {
        let Some(player) = self.player_mut(id) else {
            return Vec::new();
        };
        change(player);
        vec![Event::CreditsChanged {
            player: id,
            refusal_to_pay: player.refusal_to_pay,
            refusal_to_chance: player.refusal_to_chance,
        }]
    }

    /// Put `player` on `cell` without bonuses and resolve the landing there.
    pub fn relocate(&mut self, player: PlayerId, cell: FieldIndex) -> Vec<Event> {
        let Some(p) = self.player_mut(player) else {
            return Vec::new();
        };
        p.position = Some(cell);
        p.direction = inward_direction(cell);
        let mut events = vec![Event::Relocated { player, to: cell }];
        events.extend(self.land(player, cell));
        events
    }
}
