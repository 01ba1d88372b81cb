//! Flour-weight resolution
//!
//! Turns a target output mass (one divided piece, or a quantity of an extra)
//! into the flour-equivalent weight the whole composition scales from.
//! Everything here is per piece; multiplying by the planned piece count is a
//! separate step so that batch totals are computed from exact per-piece
//! values.

use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::models::{ComponentIngredient, Dough, Product, RecipeBook};
use crate::types::RecipeId;

/// Piece weight before losses: `base_weight / (1 - loss_ratio)`
pub fn adjusted_piece_weight(
    recipe_id: RecipeId,
    base_weight: Decimal,
    loss_ratio: Decimal,
) -> EngineResult<Decimal> {
    if loss_ratio >= Decimal::ONE {
        return Err(EngineError::DivisionByZero {
            recipe_id,
            loss_ratio,
        });
    }
    Ok(base_weight / (Decimal::ONE - loss_ratio))
}

/// Total ratio of a dough.
///
/// Direct rows contribute their ratio. A pre-dough row contributes
/// `flour_ratio × (sum of that pre-dough's direct ratios)`; the pre-dough's
/// own pre-dough rows are not expanded.
pub fn total_ratio(book: &RecipeBook, dough: &Dough) -> EngineResult<Decimal> {
    let mut total = Decimal::ZERO;
    for component in &dough.components {
        match component {
            ComponentIngredient::Base(row) => total += row.ratio,
            ComponentIngredient::PreDough(row) => {
                if row.recipe_id == dough.recipe_id {
                    return Err(EngineError::CyclicComposition {
                        recipe_id: dough.recipe_id,
                        path: vec![dough.recipe_id, dough.recipe_id],
                    });
                }
                let pre_dough = book.dough(row.recipe_id)?;
                total += row.flour_ratio * pre_dough.direct_ratio_sum();
            }
        }
    }
    Ok(total)
}

/// Flour weight for one piece of `piece_weight` grams of the given dough
pub fn resolve_flour_weight(
    book: &RecipeBook,
    recipe_id: RecipeId,
    piece_weight: Decimal,
) -> EngineResult<Decimal> {
    let dough = book.dough(recipe_id)?;
    let adjusted = adjusted_piece_weight(recipe_id, piece_weight, dough.loss_ratio)?;
    let total = total_ratio(book, dough)?;
    if total.is_zero() {
        return Err(EngineError::UndefinedComposition { recipe_id });
    }
    Ok(adjusted / total)
}

/// Flour weight for one piece of a product
pub fn resolve_product_flour_weight(book: &RecipeBook, product: &Product) -> EngineResult<Decimal> {
    resolve_flour_weight(book, product.dough_id, product.base_weight)
}

/// Scale a per-piece flour weight to a batch
pub fn batch_flour_weight(per_piece_flour_weight: Decimal, planned_piece_count: u32) -> Decimal {
    per_piece_flour_weight * Decimal::from(planned_piece_count)
}

/// Read-path variant that degrades to zero on malformed recipes.
///
/// Only for display contexts; anything that feeds production quantities or
/// stock must use [`resolve_flour_weight`].
pub fn flour_weight_or_zero(book: &RecipeBook, recipe_id: RecipeId, piece_weight: Decimal) -> Decimal {
    match resolve_flour_weight(book, recipe_id, piece_weight) {
        Ok(weight) => weight,
        Err(err) => {
            tracing::warn!(%recipe_id, error = %err, "flour weight unavailable, showing zero");
            Decimal::ZERO
        }
    }
}
