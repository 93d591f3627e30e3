mod board;
mod chance;
mod game;
mod monopoly;
mod movement;
mod payment;
mod rng;
mod state;
mod turn;

pub use crate::board::*;
pub use crate::chance::*;
pub use crate::game::*;
pub use crate::monopoly::*;
pub use crate::movement::*;
pub use crate::rng::*;
pub use crate::state::*;
pub use crate::turn::*;
