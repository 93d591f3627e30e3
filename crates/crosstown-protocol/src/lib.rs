//! Wire model shared by the Crosstown server, core simulation and clients.
//!
//! Everything here is plain serializable data: ids, commands, events and snapshots.

mod command;
mod event;
mod ids;
mod snapshot;
mod types;
pub mod wire;

pub use command::*;
pub use event::*;
pub use ids::*;
pub use snapshot::*;
pub use types::*;
