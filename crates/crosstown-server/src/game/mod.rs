//! Game session management.

pub mod state;

pub use state::{ApplyResult, GameSession};
