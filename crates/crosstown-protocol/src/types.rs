use serde::{Deserialize, Serialize};

use crate::{FieldIndex, Money, PlayerId};

/// Facing on a spoke, named by the direction of travel toward the center.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub const fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Start,
    Firm,
    Chance,
    SingleChance,
    PassBonus,
    Taxi,
    Jail,
    Exchange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentKind {
    Regular,
    /// Top tier that may be bought repeatedly at a fixed cost and income.
    Infinite,
    /// Requires giving up another owned firm.
    SacrificeCompany,
    /// Requires giving up a firm that belongs to one of the player's complete monopolies.
    SacrificeMonopoly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonopolyGroup {
    Country,
    Composite,
    Industry,
}

/// Which cells a forced relocation may target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionChoice {
    /// One of the four spoke entries.
    Cross,
    /// Any ring cell.
    Perimeter,
    /// Any spoke cell except the center.
    BetweenStart,
}

/// What the turn owner must provide next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Awaiting {
    #[default]
    Nothing,
    WaitingDirectionAtCenter,
    WaitingGoOrStay,
    WaitingDiceRoll,
    WaitingFirstChanceDie,
    WaitingSecondChanceDie,
    WaitingChanceDecision,
    WaitingJailOrTaxiDecision,
    WaitingBuy,
    WaitingSell,
    WaitingSellMonopoly,
    WaitingChange,
    WaitingSacrifice,
    WaitingInvestFree,
    WaitingRemoveInvest,
    WaitingPositionChoice { choice: PositionChoice },
    WaitingPendingPaymentOrLoss,
    TurnEnded,
}

/// Why money moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PaymentReason {
    Rent { field: FieldIndex },
    Chance { first: u8, second: u8 },
    JailBail,
    TaxiFare,
}

/// Obligation deferred with a refusal-to-pay credit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PendingAction {
    Payment {
        to: Option<PlayerId>,
        amount: Money,
        reason: PaymentReason,
    },
    /// Must relinquish one owned firm.
    Loss,
}

/// Per-game ownership of a single cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldState {
    pub index: FieldIndex,
    pub owner: Option<PlayerId>,
    pub level: u32,
}

impl FieldState {
    pub const fn unowned(index: FieldIndex) -> Self {
        Self {
            index,
            owner: None,
            level: 0,
        }
    }

    pub fn release(&mut self) {
        self.owner = None;
        self.level = 0;
    }
}
