//! Validation utilities for recipe authoring and stock events
//!
//! Field checks return a static message, like the rest of the platform's
//! validators. Graph-level checks return an [`EngineError`].

use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::models::{ComponentIngredient, Dough, Product, RecipeBook};
use crate::types::RecipeId;

// ============================================================================
// Recipe Validations
// ============================================================================

/// Validate loss ratio is a fraction in [0, 1)
pub fn validate_loss_ratio(loss_ratio: Decimal) -> Result<(), &'static str> {
    if loss_ratio < Decimal::ZERO {
        return Err("Loss ratio cannot be negative");
    }
    if loss_ratio >= Decimal::ONE {
        return Err("Loss ratio must be below 100%");
    }
    Ok(())
}

/// Validate water content is a fraction in [0, 1]
pub fn validate_water_content(water_content: Decimal) -> Result<(), &'static str> {
    if water_content < Decimal::ZERO || water_content > Decimal::ONE {
        return Err("Water content must be between 0 and 100%");
    }
    Ok(())
}

/// Validate a baker's percentage ratio
pub fn validate_ratio(ratio: Decimal) -> Result<(), &'static str> {
    if ratio < Decimal::ZERO {
        return Err("Ratio cannot be negative");
    }
    Ok(())
}

/// Validate every row of a dough
pub fn validate_dough(dough: &Dough) -> Result<(), &'static str> {
    validate_loss_ratio(dough.loss_ratio)?;
    for component in &dough.components {
        match component {
            ComponentIngredient::Base(row) => {
                validate_ratio(row.ratio)?;
                validate_water_content(row.water_content)?;
            }
            ComponentIngredient::PreDough(row) => {
                validate_ratio(row.flour_ratio)?;
                if row.recipe_id == dough.recipe_id {
                    return Err("A dough cannot use itself as a pre-dough");
                }
            }
        }
    }
    Ok(())
}

/// Validate a product's piece weight and entry amounts
pub fn validate_product(product: &Product) -> Result<(), &'static str> {
    if product.base_weight <= Decimal::ZERO {
        return Err("Piece weight must be positive");
    }
    if product
        .mix_ins
        .iter()
        .chain(product.fillings.iter())
        .any(|entry| entry.amount < Decimal::ZERO)
    {
        return Err("Mix-in and filling amounts cannot be negative");
    }
    Ok(())
}

/// Validate that a recipe and everything below it is present, acyclic and
/// within `max_depth` levels of pre-dough nesting
pub fn validate_composition(book: &RecipeBook, recipe_id: RecipeId, max_depth: usize) -> EngineResult<()> {
    let depth = book.composition_depth(recipe_id)?;
    if depth > max_depth {
        return Err(EngineError::CompositionTooDeep { recipe_id, max_depth });
    }
    Ok(())
}

// ============================================================================
// Stock Event Validations
// ============================================================================

/// Validate an adjustment carries a non-blank reason
pub fn validate_adjustment_reason(reason: Option<&str>) -> Result<(), &'static str> {
    match reason {
        Some(r) if !r.trim().is_empty() => Ok(()),
        _ => Err("Adjustment reason is required"),
    }
}

/// Validate procurement quantities
pub fn validate_procurement(
    packages: Decimal,
    spec_weight_grams: Decimal,
    price_per_package: Decimal,
) -> Result<(), &'static str> {
    if packages <= Decimal::ZERO {
        return Err("Package count must be positive");
    }
    if spec_weight_grams <= Decimal::ZERO {
        return Err("Package weight must be positive");
    }
    if price_per_package < Decimal::ZERO {
        return Err("Package price cannot be negative");
    }
    Ok(())
}

/// Validate a temperature reading is physically plausible for a bakery
pub fn validate_temperature(celsius: Decimal) -> Result<(), &'static str> {
    if celsius < Decimal::from(-30) || celsius > Decimal::from(80) {
        return Err("Temperature must be between -30°C and 80°C");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductEntry;
    use std::str::FromStr;
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    // ========================================================================
    // Recipe Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_loss_ratio() {
        assert!(validate_loss_ratio(Decimal::ZERO).is_ok());
        assert!(validate_loss_ratio(dec("0.12")).is_ok());
        assert!(validate_loss_ratio(dec("0.999")).is_ok());
        assert!(validate_loss_ratio(Decimal::ONE).is_err());
        assert!(validate_loss_ratio(dec("-0.01")).is_err());
    }

    #[test]
    fn test_validate_water_content() {
        assert!(validate_water_content(Decimal::ZERO).is_ok());
        assert!(validate_water_content(dec("0.87")).is_ok());
        assert!(validate_water_content(Decimal::ONE).is_ok());
        assert!(validate_water_content(dec("1.01")).is_err());
        assert!(validate_water_content(dec("-0.5")).is_err());
    }

    #[test]
    fn test_validate_dough() {
        let id = Uuid::from_u128(1);
        let valid = Dough::new(id, "Brioche")
            .with_loss_ratio(dec("0.05"))
            .with_component(ComponentIngredient::flour(Uuid::from_u128(10), dec("1")))
            .with_component(ComponentIngredient::wet(Uuid::from_u128(11), dec("0.5"), dec("0.75")));
        assert!(validate_dough(&valid).is_ok());

        let self_ref = Dough::new(id, "Loop").with_component(ComponentIngredient::pre_dough(id, dec("0.2")));
        assert_eq!(
            validate_dough(&self_ref),
            Err("A dough cannot use itself as a pre-dough")
        );

        let wet = Dough::new(id, "Soup").with_component(ComponentIngredient::wet(Uuid::from_u128(11), dec("1"), dec("2")));
        assert!(validate_dough(&wet).is_err());
    }

    #[test]
    fn test_validate_product() {
        let product = Product::new(Uuid::from_u128(100), "Roll", Uuid::from_u128(1), dec("80"));
        assert!(validate_product(&product).is_ok());
        let negative = product.clone().with_filling(ProductEntry::ingredient(Uuid::from_u128(5), dec("-1")));
        assert!(validate_product(&negative).is_err());
        let weightless = Product::new(Uuid::from_u128(100), "Air", Uuid::from_u128(1), Decimal::ZERO);
        assert!(validate_product(&weightless).is_err());
    }

    #[test]
    fn test_validate_composition_depth() {
        let book = RecipeBook::new()
            .with_dough(Dough::new(Uuid::from_u128(1), "Main").with_component(ComponentIngredient::pre_dough(Uuid::from_u128(2), dec("0.2"))))
            .with_dough(Dough::new(Uuid::from_u128(2), "Sponge").with_component(ComponentIngredient::flour(Uuid::from_u128(10), dec("1"))));
        assert!(validate_composition(&book, Uuid::from_u128(1), 1).is_ok());
        assert_eq!(
            validate_composition(&book, Uuid::from_u128(1), 0),
            Err(EngineError::CompositionTooDeep {
                recipe_id: Uuid::from_u128(1),
                max_depth: 0
            })
        );
    }

    // ========================================================================
    // Stock Event Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_adjustment_reason() {
        assert!(validate_adjustment_reason(Some("Spoiled")).is_ok());
        assert!(validate_adjustment_reason(Some("")).is_err());
        assert!(validate_adjustment_reason(Some("  \t")).is_err());
        assert!(validate_adjustment_reason(None).is_err());
    }

    #[test]
    fn test_validate_procurement() {
        assert!(validate_procurement(dec("2"), dec("25000"), dec("850")).is_ok());
        assert!(validate_procurement(dec("2"), dec("25000"), Decimal::ZERO).is_ok());
        assert!(validate_procurement(Decimal::ZERO, dec("25000"), dec("850")).is_err());
        assert!(validate_procurement(dec("1"), Decimal::ZERO, dec("850")).is_err());
        assert!(validate_procurement(dec("1"), dec("1000"), dec("-1")).is_err());
    }

    #[test]
    fn test_validate_temperature() {
        assert!(validate_temperature(dec("24")).is_ok());
        assert!(validate_temperature(dec("-5")).is_ok());
        assert!(validate_temperature(dec("95")).is_err());
    }
}
