//! Production calculation tests
//!
//! Tests for the consumption engine including:
//! - Flour weight resolution against the handbook example
//! - Flattened weights summing to the dough's direct ratios
//! - Repeated ingredients across pre-doughs merging into one line
//! - Mix-ins scaling with flour, fillings with pieces
//! - Loss applied once, on the product dough only

use bakery_shared::{
    calculate_production, flatten_consumption, mixing_sheets, resolve_flour_weight, total_ratio,
    ComponentIngredient, Dough, EngineError, LedgerEvent, Product, ProductEntry, RecipeBook, SheetRow, StockLedger,
    ThermalContext,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

const FLOUR: u128 = 10;
const WATER: u128 = 11;
const SALT: u128 = 12;
const YEAST: u128 = 13;
const CHOCOLATE: u128 = 14;
const SUGAR: u128 = 15;
const MILK: u128 = 16;

/// Baguette with a poolish, plus a custard extra for filled products
fn bakery_book() -> RecipeBook {
    let baguette = Dough::new(id(1), "Baguette")
        .with_loss_ratio(dec("0.1"))
        .with_target_temperature(dec("24"))
        .with_component(ComponentIngredient::flour(id(FLOUR), dec("0.7")))
        .with_component(ComponentIngredient::wet(id(WATER), dec("0.4"), Decimal::ONE))
        .with_component(ComponentIngredient::base(id(SALT), dec("0.02")))
        .with_component(ComponentIngredient::pre_dough(id(2), dec("0.3")));
    let poolish = Dough::new(id(2), "Poolish")
        .with_component(ComponentIngredient::flour(id(FLOUR), dec("1")))
        .with_component(ComponentIngredient::wet(id(WATER), dec("1"), Decimal::ONE))
        .with_component(ComponentIngredient::base(id(YEAST), dec("0.001")));
    let custard = Dough::new(id(3), "Custard")
        .with_loss_ratio(dec("0.2"))
        .with_component(ComponentIngredient::base(id(SUGAR), dec("0.5")))
        .with_component(ComponentIngredient::wet(id(MILK), dec("0.5"), dec("0.87")));

    RecipeBook::new()
        .with_dough(baguette)
        .with_dough(poolish)
        .with_dough(custard)
        .with_product(Product::new(id(100), "Baguette", id(1), dec("350")))
        .with_product(
            Product::new(id(101), "Chocolate custard baguette", id(1), dec("350"))
                .with_mix_in(ProductEntry::ingredient(id(CHOCOLATE), dec("0.1")))
                .with_filling(ProductEntry::extra(id(3), dec("40"))),
        )
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Handbook example: 80g piece, 2% loss, total ratio 1.439392
    #[test]
    fn test_handbook_flour_weight() {
        let main = Dough::new(id(1), "Milk bread")
            .with_loss_ratio(dec("0.02"))
            .with_component(ComponentIngredient::flour(id(FLOUR), dec("0.72")))
            .with_component(ComponentIngredient::wet(id(WATER), dec("0.38"), Decimal::ONE))
            .with_component(ComponentIngredient::base(id(SALT), dec("0.0134")))
            .with_component(ComponentIngredient::base(id(SUGAR), dec("0.044")))
            .with_component(ComponentIngredient::base(id(YEAST), dec("0.005")))
            .with_component(ComponentIngredient::base(id(MILK), dec("0.04")))
            .with_component(ComponentIngredient::pre_dough(id(2), dec("0.28")));
        let poolish = Dough::new(id(2), "Poolish")
            .with_component(ComponentIngredient::flour(id(FLOUR), dec("0.5")))
            .with_component(ComponentIngredient::wet(id(WATER), dec("0.34"), Decimal::ONE))
            .with_component(ComponentIngredient::base(id(YEAST), dec("0.0064")));
        let book = RecipeBook::new().with_dough(main).with_dough(poolish);

        let dough = book.dough(id(1)).unwrap();
        assert_eq!(total_ratio(&book, dough).unwrap(), dec("1.439392"));
        let flour = resolve_flour_weight(&book, id(1), dec("80")).unwrap();
        assert_eq!(flour.round_dp(2), dec("56.71"));
    }

    /// Flour and water appear in both doughs and come out as one line each
    #[test]
    fn test_repeated_ingredients_merge() {
        let book = bakery_book();
        let result = flatten_consumption(&book, id(1), dec("1000")).unwrap();

        assert_eq!(result.grams_of(id(FLOUR)), dec("700") + dec("300"));
        assert_eq!(result.grams_of(id(WATER)), dec("400") + dec("300"));
        assert_eq!(result.grams_of(id(SALT)), dec("20"));
        assert_eq!(result.grams_of(id(YEAST)), dec("0.3"));
        assert_eq!(result.weights.len(), 4);
        assert_eq!(result.hydration(), Some(dec("0.7")));
    }

    /// A plain product only draws the dough
    #[test]
    fn test_calculate_plain_product() {
        let book = bakery_book();
        let requirement = calculate_production(&book, id(100), 10).unwrap();
        assert!(requirement.product_entries.is_empty());
        assert_eq!(requirement.weights, requirement.dough.weights);
        assert_eq!(
            requirement.batch_flour_weight,
            requirement.flour_weight_per_piece * dec("10")
        );
    }

    /// Mix-ins follow batch flour, the custard filling follows pieces with its own loss
    #[test]
    fn test_calculate_with_mix_in_and_filling() {
        let book = bakery_book();
        let requirement = calculate_production(&book, id(101), 10).unwrap();

        let chocolate = requirement.weights[&id(CHOCOLATE)];
        assert_eq!(chocolate, requirement.batch_flour_weight * dec("0.1"));

        // 400g custard at 20% loss is 500g before loss, half sugar, half milk
        assert_eq!(requirement.weights[&id(SUGAR)], dec("250"));
        assert_eq!(requirement.weights[&id(MILK)], dec("250"));
    }

    /// Zero pieces yields an empty requirement
    #[test]
    fn test_zero_pieces() {
        let book = bakery_book();
        let requirement = calculate_production(&book, id(101), 0).unwrap();
        assert!(requirement.weights.is_empty());
        assert_eq!(requirement.total_grams(), Decimal::ZERO);
    }

    /// A pre-dough's own loss ratio is ignored when it is nested
    #[test]
    fn test_pre_dough_loss_not_applied_when_nested() {
        let lossy_poolish = Dough::new(id(2), "Poolish")
            .with_loss_ratio(dec("0.5"))
            .with_component(ComponentIngredient::flour(id(FLOUR), dec("1")))
            .with_component(ComponentIngredient::wet(id(WATER), dec("1"), Decimal::ONE))
            .with_component(ComponentIngredient::base(id(YEAST), dec("0.001")));
        let lossy = bakery_book().with_dough(lossy_poolish);
        let plain = bakery_book();

        assert_eq!(
            resolve_flour_weight(&lossy, id(1), dec("350")).unwrap(),
            resolve_flour_weight(&plain, id(1), dec("350")).unwrap()
        );
        assert_eq!(
            flatten_consumption(&lossy, id(1), dec("1000")).unwrap(),
            flatten_consumption(&plain, id(1), dec("1000")).unwrap()
        );
        assert_eq!(
            calculate_production(&lossy, id(100), 12).unwrap().weights,
            calculate_production(&plain, id(100), 12).unwrap().weights
        );

        // resolved on its own the poolish does lose half: 100g needs 200g of dough
        assert_eq!(
            resolve_flour_weight(&lossy, id(2), dec("100")).unwrap(),
            dec("200") / dec("2.001")
        );
    }

    /// A task planned for zero pieces completes without touching stock
    #[test]
    fn test_zero_piece_task_consumes_nothing() {
        let book = bakery_book();
        let requirement = calculate_production(&book, id(100), 0).unwrap();

        let mut ledger = StockLedger::new();
        ledger
            .apply(
                id(FLOUR),
                LedgerEvent::Procurement {
                    packages: dec("1"),
                    spec_weight_grams: dec("1000"),
                    price_per_package: dec("40"),
                },
            )
            .unwrap();
        let before = ledger.stocks().clone();

        let outcomes = ledger.consume(&requirement.weights).unwrap();
        assert!(outcomes.is_empty());
        assert_eq!(ledger.stocks(), &before);
    }

    /// A pre-dough cycle is refused, not followed
    #[test]
    fn test_cycle_is_refused() {
        let book = RecipeBook::new()
            .with_dough(
                Dough::new(id(1), "A")
                    .with_component(ComponentIngredient::flour(id(FLOUR), dec("1")))
                    .with_component(ComponentIngredient::pre_dough(id(2), dec("0.5"))),
            )
            .with_dough(
                Dough::new(id(2), "B")
                    .with_component(ComponentIngredient::flour(id(FLOUR), dec("1")))
                    .with_component(ComponentIngredient::pre_dough(id(1), dec("0.5"))),
            );
        let err = flatten_consumption(&book, id(1), dec("100")).unwrap_err();
        assert!(matches!(err, EngineError::CyclicComposition { .. }));
    }

    /// Main sheet first, pre-dough lump equal to the pre-dough's own sheet
    #[test]
    fn test_mixing_sheets_order_and_lump() {
        let book = bakery_book();
        let context = ThermalContext {
            mixer_friction_factor: dec("1"),
            flour_temperature: dec("24"),
            ambient_temperature: dec("25"),
            water_temperature: dec("30"),
        };
        let sheets = mixing_sheets(&book, id(1), dec("1000"), Some(&context)).unwrap();

        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].recipe_id, id(1));
        assert_eq!(sheets[1].recipe_id, id(2));
        assert_eq!(sheets[1].depth, 1);

        let lump = sheets[0]
            .rows
            .iter()
            .find_map(|row| match row {
                SheetRow::PreDough { grams, .. } => Some(*grams),
                _ => None,
            })
            .unwrap();
        assert_eq!(lump, sheets[1].total_grams);

        let advised = sheets[0].rows.iter().any(|row| {
            matches!(row, SheetRow::Ingredient { thermal: Some(_), .. })
        });
        assert!(advised);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for flour weights (0.1g to 10kg)
    fn flour_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100000i64).prop_map(|n| Decimal::new(n, 1))
    }

    /// Strategy for ratios (0.0001 to 1.5)
    fn ratio_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=15000i64).prop_map(|n| Decimal::new(n, 4))
    }

    fn flat_dough(ratios: &[Decimal]) -> RecipeBook {
        let dough = ratios
            .iter()
            .enumerate()
            .fold(Dough::new(id(1), "Flat"), |dough, (i, ratio)| {
                dough.with_component(ComponentIngredient::base(id(1000 + i as u128), *ratio))
            });
        RecipeBook::new().with_dough(dough)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Total flattened mass of a flat dough is flour × sum of ratios
        #[test]
        fn prop_flat_total_is_flour_times_ratio_sum(
            ratios in prop::collection::vec(ratio_strategy(), 1..10),
            flour in flour_strategy()
        ) {
            let book = flat_dough(&ratios);
            let result = flatten_consumption(&book, id(1), flour).unwrap();
            let ratio_sum: Decimal = ratios.iter().sum();
            prop_assert_eq!(result.total_grams(), flour * ratio_sum);
        }

        /// With one level of pre-dough the flattened mass is still flour × total ratio
        #[test]
        fn prop_nested_total_is_flour_times_total_ratio(
            main_ratios in prop::collection::vec(ratio_strategy(), 1..6),
            pre_ratios in prop::collection::vec(ratio_strategy(), 1..6),
            flour_ratio in ratio_strategy(),
            flour in flour_strategy()
        ) {
            let main = main_ratios
                .iter()
                .enumerate()
                .fold(Dough::new(id(1), "Main"), |dough, (i, ratio)| {
                    dough.with_component(ComponentIngredient::base(id(1000 + i as u128), *ratio))
                })
                .with_component(ComponentIngredient::pre_dough(id(2), flour_ratio));
            let pre = pre_ratios
                .iter()
                .enumerate()
                .fold(Dough::new(id(2), "Pre"), |dough, (i, ratio)| {
                    dough.with_component(ComponentIngredient::base(id(2000 + i as u128), *ratio))
                });
            let book = RecipeBook::new().with_dough(main).with_dough(pre);

            let total = total_ratio(&book, book.dough(id(1)).unwrap()).unwrap();
            let result = flatten_consumption(&book, id(1), flour).unwrap();
            prop_assert_eq!(result.total_grams(), flour * total);
        }

        /// An ingredient used by both the dough and its pre-dough comes out as one summed line
        #[test]
        fn prop_shared_ingredient_merges(
            main_ratio in ratio_strategy(),
            pre_ratio in ratio_strategy(),
            flour_ratio in ratio_strategy(),
            flour in flour_strategy()
        ) {
            let book = RecipeBook::new()
                .with_dough(
                    Dough::new(id(1), "Main")
                        .with_component(ComponentIngredient::flour(id(FLOUR), main_ratio))
                        .with_component(ComponentIngredient::pre_dough(id(2), flour_ratio)),
                )
                .with_dough(
                    Dough::new(id(2), "Pre").with_component(ComponentIngredient::flour(id(FLOUR), pre_ratio)),
                );

            let result = flatten_consumption(&book, id(1), flour).unwrap();
            prop_assert_eq!(result.weights.len(), 1);
            prop_assert_eq!(
                result.grams_of(id(FLOUR)),
                flour * main_ratio + flour * flour_ratio * pre_ratio
            );
        }

        /// Flattening is deterministic
        #[test]
        fn prop_flatten_idempotent(flour in flour_strategy()) {
            let book = bakery_book();
            let first = flatten_consumption(&book, id(1), flour).unwrap();
            let second = flatten_consumption(&book, id(1), flour).unwrap();
            prop_assert_eq!(first, second);
        }

        /// Doubling the flour doubles every line
        #[test]
        fn prop_flatten_scales_linearly(flour in flour_strategy()) {
            let book = bakery_book();
            let single = flatten_consumption(&book, id(1), flour).unwrap();
            let double = flatten_consumption(&book, id(1), flour * dec("2")).unwrap();
            for (ingredient_id, grams) in &single.weights {
                prop_assert_eq!(double.weights[ingredient_id], *grams * dec("2"));
            }
        }

        /// Resolved flour times total ratio gives back the loss-adjusted piece
        #[test]
        fn prop_flour_weight_round_trips_to_piece(
            piece in (100i64..=200000i64).prop_map(|n| Decimal::new(n, 2))
        ) {
            let book = bakery_book();
            let flour = resolve_flour_weight(&book, id(1), piece).unwrap();
            let total = total_ratio(&book, book.dough(id(1)).unwrap()).unwrap();
            let adjusted = piece / dec("0.9");
            prop_assert_eq!((flour * total).round_dp(8), adjusted.round_dp(8));
        }

        /// Batch weights never go negative and are never zero-valued lines
        #[test]
        fn prop_requirement_lines_positive(pieces in 0u32..500) {
            let book = bakery_book();
            let requirement = calculate_production(&book, id(101), pieces).unwrap();
            for grams in requirement.weights.values() {
                prop_assert!(*grams > Decimal::ZERO);
            }
        }
    }
}
