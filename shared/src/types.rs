//! Common types used across the engine

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a base ingredient (flour, water, butter, ...)
pub type IngredientId = Uuid;

/// Identity of a recipe family. Lookups always resolve to the family's
/// active version.
pub type RecipeId = Uuid;

/// Identity of a finished product
pub type ProductId = Uuid;

/// Resolved weights in grams keyed by base ingredient.
///
/// A `BTreeMap` keeps iteration order stable so that two calculations over
/// the same snapshot serialize identically.
pub type WeightMap = BTreeMap<IngredientId, Decimal>;

/// Add `grams` to the entry for `ingredient_id`, creating it when absent.
pub fn accumulate(weights: &mut WeightMap, ingredient_id: IngredientId, grams: Decimal) {
    *weights.entry(ingredient_id).or_insert(Decimal::ZERO) += grams;
}

/// Merge `other` into `weights`, summing shared keys.
pub fn merge_weights(weights: &mut WeightMap, other: &WeightMap) {
    for (ingredient_id, grams) in other {
        accumulate(weights, *ingredient_id, *grams);
    }
}

/// Total of every weight in the map
pub fn total_weight(weights: &WeightMap) -> Decimal {
    weights.values().copied().sum()
}

/// Temperatures observed on the bakery floor when a batch is mixed.
///
/// Supplied per request by the task layer (sensor readings or manual entry);
/// never cached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ThermalContext {
    /// Heat added by the mixer, in °C
    pub mixer_friction_factor: Decimal,
    pub flour_temperature: Decimal,
    pub ambient_temperature: Decimal,
    /// Temperature of the tap water available right now
    pub water_temperature: Decimal,
}
