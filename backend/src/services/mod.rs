//! Business logic services for bakery production

pub mod inventory;
pub mod production;
pub mod recipe;

pub use inventory::InventoryService;
pub use production::ProductionService;
pub use recipe::RecipeService;
