//! Domain models for bakery production

mod inventory;
mod production;
mod recipe;

pub use inventory::*;
pub use production::*;
pub use recipe::*;
