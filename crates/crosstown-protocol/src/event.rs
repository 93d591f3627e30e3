use serde::{Deserialize, Serialize};

use crate::{
    Awaiting, Direction, FieldIndex, FieldState, Money, MonopolyId, PaymentReason, PlayerId,
};

/// All possible sim→client events. Fully serializable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // Game flow
    TurnStarted {
        round: u32,
        player: PlayerId,
    },
    TurnEnded {
        player: PlayerId,
    },
    /// The turn owner must now provide the input described by `awaiting`.
    Prompt {
        player: PlayerId,
        awaiting: Awaiting,
        /// Legal target cells for choice prompts; empty when not applicable.
        candidates: Vec<FieldIndex>,
    },
    GameEnded {
        winner: Option<PlayerId>,
    },

    // Dice and movement
    DiceRolled {
        player: PlayerId,
        faces: Vec<u8>,
    },
    DirectionChosen {
        player: PlayerId,
        direction: Direction,
    },
    Moved {
        player: PlayerId,
        path: Vec<FieldIndex>,
        /// The mover came to rest on the last cell of `path`.
        rest: bool,
        turned_to_center: bool,
        passed_start: bool,
    },
    Relocated {
        player: PlayerId,
        to: FieldIndex,
    },
    StartBonus {
        player: PlayerId,
        amount: Money,
    },
    PassBonus {
        player: PlayerId,
        field: FieldIndex,
        amount: Money,
    },
    JailEntered {
        player: PlayerId,
    },
    TaxiEntered {
        player: PlayerId,
    },
    JailOrTaxiResolved {
        player: PlayerId,
        paid: bool,
    },

    // Chance
    ChanceDrawn {
        player: PlayerId,
        first: u8,
        second: u8,
        label: String,
        adverse: bool,
    },
    ChanceRefused {
        player: PlayerId,
    },

    // Money
    BalanceChanged {
        player: PlayerId,
        delta: Money,
        balance: Money,
    },
    PaymentSettled {
        payer: PlayerId,
        receiver: Option<PlayerId>,
        amount: Money,
        reason: PaymentReason,
    },
    PaymentDeferred {
        payer: PlayerId,
        receiver: Option<PlayerId>,
        amount: Money,
        reason: PaymentReason,
    },
    PaymentSuppressed {
        payer: PlayerId,
        receiver: Option<PlayerId>,
        amount: Money,
        reason: PaymentReason,
    },
    PaymentRefused {
        payer: PlayerId,
        receiver: Option<PlayerId>,
        amount: Money,
    },
    /// A forced loss was pushed onto the pending queue instead of resolved now.
    LossDeferred {
        player: PlayerId,
    },
    IncomeClaimed {
        player: PlayerId,
        field: FieldIndex,
        amount: Money,
    },
    IncomeSuppressed {
        player: PlayerId,
        amount: Money,
    },
    Bankrupt {
        player: PlayerId,
    },

    // Property
    FieldChanged {
        field: FieldState,
    },
    FieldBought {
        player: PlayerId,
        field: FieldIndex,
        price: Money,
    },
    FieldSold {
        player: PlayerId,
        field: FieldIndex,
        price: Money,
    },
    FieldLost {
        player: PlayerId,
        field: FieldIndex,
    },
    FieldsExchanged {
        player: PlayerId,
        own: FieldIndex,
        other_player: PlayerId,
        other: FieldIndex,
    },
    Invested {
        player: PlayerId,
        field: FieldIndex,
        level: u32,
        cost: Money,
    },
    InvestmentRemoved {
        player: PlayerId,
        field: FieldIndex,
        level: u32,
    },
    MonopolyFormed {
        monopoly: MonopolyId,
        owner: PlayerId,
    },
    MonopolyLost {
        monopoly: MonopolyId,
        former_owner: PlayerId,
    },

    // Player status
    CreditsChanged {
        player: PlayerId,
        refusal_to_pay: u32,
        refusal_to_chance: u32,
    },
    Sequestered {
        player: PlayerId,
        turns: u32,
    },
    PlayerOffline {
        player: PlayerId,
        offline: bool,
    },
}
