use serde::{Deserialize, Serialize};

use crate::{Direction, FieldIndex, MonopolyId};

/// All possible client→sim commands issued by the turn owner. Fully serializable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    // Dice and movement
    /// Roll the dice the current prompt asks for (movement pair or one chance die).
    RollDice,
    ChooseDirection { direction: Direction },
    /// Take the spoke toward the center (`go`) or stay on the ring.
    GoOrStay { go: bool },
    /// Pay the bail/fare (`pay`) or serve the jail turn / walk out of the taxi.
    JailOrTaxi { pay: bool },
    ChooseTarget { field: FieldIndex },

    // Property
    Buy { field: FieldIndex },
    Sell { field: FieldIndex },
    SellMonopoly { monopoly: MonopolyId },
    Sacrifice { field: FieldIndex },
    Exchange { own: FieldIndex, other: FieldIndex },
    Invest {
        field: FieldIndex,
        #[serde(default)]
        sacrifice: Option<FieldIndex>,
    },
    RemoveInvestment { field: FieldIndex },
    ClaimIncome { field: FieldIndex },

    // Chance
    AcceptChance,
    RefuseChance,

    // Deferred obligations
    /// Settle the oldest deferred obligation; a loss names the firm to give up.
    PayDeferred {
        #[serde(default)]
        field: Option<FieldIndex>,
    },
    /// Drop the oldest deferred obligation by spending a refusal-to-pay credit.
    RefuseDeferred,

    /// Skip an optional prompt (buy, exchange, free investment).
    Decline,
    EndTurn,
}

impl Command {
    /// Stable name for logs and rejection messages.
    pub fn name(&self) -> &'static str {
        match self {
            Command::RollDice => "RollDice",
            Command::ChooseDirection { .. } => "ChooseDirection",
            Command::GoOrStay { .. } => "GoOrStay",
            Command::JailOrTaxi { .. } => "JailOrTaxi",
            Command::ChooseTarget { .. } => "ChooseTarget",
            Command::Buy { .. } => "Buy",
            Command::Sell { .. } => "Sell",
            Command::SellMonopoly { .. } => "SellMonopoly",
            Command::Sacrifice { .. } => "Sacrifice",
            Command::Exchange { .. } => "Exchange",
            Command::Invest { .. } => "Invest",
            Command::RemoveInvestment { .. } => "RemoveInvestment",
            Command::ClaimIncome { .. } => "ClaimIncome",
            Command::AcceptChance => "AcceptChance",
            Command::RefuseChance => "RefuseChance",
            Command::PayDeferred { .. } => "PayDeferred",
            Command::RefuseDeferred => "RefuseDeferred",
            Command::Decline => "Decline",
            Command::EndTurn => "EndTurn",
        }
    }
}
