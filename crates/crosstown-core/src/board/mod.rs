//! Static board data: field definitions, investment tiers and monopoly sets.

mod loader;
mod types;

pub use loader::*;
pub use types::*;
