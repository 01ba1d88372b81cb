//! HTTP handlers

pub mod health;
pub mod inventory;
pub mod production;

pub use health::health_check;
pub use inventory::*;
pub use production::*;
