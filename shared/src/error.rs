//! Engine error taxonomy
//!
//! Calculation errors describe malformed recipe data and are never replaced
//! by a zero result. Ledger errors abort the whole event or batch.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{IngredientId, ProductId, RecipeId};

/// A single ingredient that cannot cover a requested consumption
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockShortage {
    pub ingredient_id: IngredientId,
    pub required_grams: Decimal,
    pub available_grams: Decimal,
}

impl StockShortage {
    /// Grams missing to satisfy the requirement
    pub fn missing_grams(&self) -> Decimal {
        self.required_grams - self.available_grams
    }
}

/// Errors raised by the calculation engine and the valuation ledger
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Recipe {recipe_id} has a total ratio of zero")]
    UndefinedComposition { recipe_id: RecipeId },

    #[error("Recipe {recipe_id} references itself through its pre-doughs ({})", format_path(.path))]
    CyclicComposition {
        recipe_id: RecipeId,
        path: Vec<RecipeId>,
    },

    #[error("Recipe {recipe_id} has loss ratio {loss_ratio}, which must be below 1")]
    DivisionByZero {
        recipe_id: RecipeId,
        loss_ratio: Decimal,
    },

    #[error("Recipe {recipe_id} is not part of the loaded snapshot")]
    MissingRecipe { recipe_id: RecipeId },

    #[error("Product {product_id} is not part of the loaded snapshot")]
    MissingProduct { product_id: ProductId },

    #[error("Recipe {recipe_id} nests pre-doughs deeper than {max_depth} levels")]
    CompositionTooDeep {
        recipe_id: RecipeId,
        max_depth: usize,
    },

    #[error("Recipe {recipe_id} contains a negative ratio ({value})")]
    InvalidRatio { recipe_id: RecipeId, value: Decimal },

    #[error("Insufficient stock for {} ingredient(s)", .shortages.len())]
    InsufficientStock { shortages: Vec<StockShortage> },

    #[error("Invalid adjustment for ingredient {ingredient_id}: {message}")]
    InvalidAdjustment {
        ingredient_id: IngredientId,
        message: String,
    },

    #[error("Invalid ledger event for ingredient {ingredient_id}: {message}")]
    InvalidLedgerEvent {
        ingredient_id: IngredientId,
        message: String,
    },
}

impl EngineError {
    /// Whether the error stems from malformed recipe data rather than stock state
    pub fn is_calculation_error(&self) -> bool {
        matches!(
            self,
            EngineError::UndefinedComposition { .. }
                | EngineError::CyclicComposition { .. }
                | EngineError::DivisionByZero { .. }
                | EngineError::MissingRecipe { .. }
                | EngineError::MissingProduct { .. }
                | EngineError::CompositionTooDeep { .. }
                | EngineError::InvalidRatio { .. }
        )
    }
}

fn format_path(path: &[RecipeId]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
