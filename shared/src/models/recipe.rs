//! Ratio tree models: doughs, pre-dough references and products
//!
//! A recipe is stored as baker's percentages. Every row of a dough is either a
//! base ingredient with a ratio relative to the dough's flour, or a reference
//! to another recipe (a pre-dough such as a poolish or biga) carrying the
//! share of flour that should be produced through it.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{IngredientId, ProductId, RecipeId};

/// A base ingredient row inside a dough
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaseIngredientRow {
    pub ingredient_id: IngredientId,
    /// Baker's percentage as a fraction (0.72 for 72%)
    pub ratio: Decimal,
    /// Counted toward the total-flour baseline
    #[serde(default)]
    pub is_flour: bool,
    /// Fraction of the ingredient's mass that is water (0..=1)
    #[serde(default)]
    pub water_content: Decimal,
}

/// A pre-dough reference inside a dough
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreDoughRow {
    pub recipe_id: RecipeId,
    /// Share of the parent dough's flour allocated to this pre-dough
    pub flour_ratio: Decimal,
}

/// One row of a dough. Exactly one binding per row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentIngredient {
    Base(BaseIngredientRow),
    PreDough(PreDoughRow),
}

impl ComponentIngredient {
    /// Plain base ingredient row
    pub fn base(ingredient_id: IngredientId, ratio: Decimal) -> Self {
        ComponentIngredient::Base(BaseIngredientRow {
            ingredient_id,
            ratio,
            is_flour: false,
            water_content: Decimal::ZERO,
        })
    }

    /// Base ingredient row counted as flour
    pub fn flour(ingredient_id: IngredientId, ratio: Decimal) -> Self {
        ComponentIngredient::Base(BaseIngredientRow {
            ingredient_id,
            ratio,
            is_flour: true,
            water_content: Decimal::ZERO,
        })
    }

    /// Base ingredient row carrying water (water itself, milk, eggs, ...)
    pub fn wet(ingredient_id: IngredientId, ratio: Decimal, water_content: Decimal) -> Self {
        ComponentIngredient::Base(BaseIngredientRow {
            ingredient_id,
            ratio,
            is_flour: false,
            water_content,
        })
    }

    /// Reference to another recipe used as a pre-dough
    pub fn pre_dough(recipe_id: RecipeId, flour_ratio: Decimal) -> Self {
        ComponentIngredient::PreDough(PreDoughRow {
            recipe_id,
            flour_ratio,
        })
    }

    /// The ratio carried by the row, whichever binding it has
    pub fn raw_ratio(&self) -> Decimal {
        match self {
            ComponentIngredient::Base(row) => row.ratio,
            ComponentIngredient::PreDough(row) => row.flour_ratio,
        }
    }
}

/// The dough of a recipe version (a `RecipeComponent`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dough {
    /// The recipe family this dough is the active version of
    pub recipe_id: RecipeId,
    pub name: String,
    /// Fraction of mass lost between mixing and division (0 <= r < 1)
    #[serde(default)]
    pub loss_ratio: Decimal,
    /// Desired dough temperature after mixing, in °C
    #[serde(default)]
    pub target_temperature: Option<Decimal>,
    pub components: Vec<ComponentIngredient>,
}

impl Dough {
    pub fn new(recipe_id: RecipeId, name: impl Into<String>) -> Self {
        Self {
            recipe_id,
            name: name.into(),
            loss_ratio: Decimal::ZERO,
            target_temperature: None,
            components: Vec::new(),
        }
    }

    pub fn with_loss_ratio(mut self, loss_ratio: Decimal) -> Self {
        self.loss_ratio = loss_ratio;
        self
    }

    pub fn with_target_temperature(mut self, temperature: Decimal) -> Self {
        self.target_temperature = Some(temperature);
        self
    }

    pub fn with_component(mut self, component: ComponentIngredient) -> Self {
        self.components.push(component);
        self
    }

    /// Sum of the base-ingredient ratios, ignoring pre-dough rows
    pub fn direct_ratio_sum(&self) -> Decimal {
        self.base_rows().map(|row| row.ratio).sum()
    }

    pub fn base_rows(&self) -> impl Iterator<Item = &BaseIngredientRow> {
        self.components.iter().filter_map(|c| match c {
            ComponentIngredient::Base(row) => Some(row),
            ComponentIngredient::PreDough(_) => None,
        })
    }

    pub fn pre_dough_rows(&self) -> impl Iterator<Item = &PreDoughRow> {
        self.components.iter().filter_map(|c| match c {
            ComponentIngredient::PreDough(row) => Some(row),
            ComponentIngredient::Base(_) => None,
        })
    }
}

/// What a product-level entry draws from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntryTarget {
    Ingredient(IngredientId),
    /// An independent sub-recipe such as a pastry cream
    Extra(RecipeId),
}

/// A mix-in or filling/topping line of a product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductEntry {
    pub target: EntryTarget,
    /// Ratio relative to batch flour for mix-ins, grams per piece for fillings
    pub amount: Decimal,
}

impl ProductEntry {
    pub fn ingredient(ingredient_id: IngredientId, amount: Decimal) -> Self {
        Self {
            target: EntryTarget::Ingredient(ingredient_id),
            amount,
        }
    }

    pub fn extra(recipe_id: RecipeId, amount: Decimal) -> Self {
        Self {
            target: EntryTarget::Extra(recipe_id),
            amount,
        }
    }
}

/// A finished product made from one dough
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub dough_id: RecipeId,
    /// Divided-piece weight in grams, before loss adjustment
    pub base_weight: Decimal,
    #[serde(default)]
    pub mix_ins: Vec<ProductEntry>,
    #[serde(default)]
    pub fillings: Vec<ProductEntry>,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, dough_id: RecipeId, base_weight: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            dough_id,
            base_weight,
            mix_ins: Vec::new(),
            fillings: Vec::new(),
        }
    }

    pub fn with_mix_in(mut self, entry: ProductEntry) -> Self {
        self.mix_ins.push(entry);
        self
    }

    pub fn with_filling(mut self, entry: ProductEntry) -> Self {
        self.fillings.push(entry);
        self
    }

    /// Every sub-recipe referenced by mix-ins and fillings
    pub fn extra_ids(&self) -> impl Iterator<Item = RecipeId> + '_ {
        self.mix_ins
            .iter()
            .chain(self.fillings.iter())
            .filter_map(|entry| match entry.target {
                EntryTarget::Extra(id) => Some(id),
                EntryTarget::Ingredient(_) => None,
            })
    }
}

/// Immutable snapshot of every dough and product needed for a calculation.
///
/// Doughs are keyed by recipe family; the loader stores the active version
/// of each family. Calculations only ever read from the book.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeBook {
    doughs: HashMap<RecipeId, Dough>,
    products: HashMap<ProductId, Product>,
}

impl RecipeBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_dough(&mut self, dough: Dough) {
        self.doughs.insert(dough.recipe_id, dough);
    }

    pub fn insert_product(&mut self, product: Product) {
        self.products.insert(product.id, product);
    }

    pub fn with_dough(mut self, dough: Dough) -> Self {
        self.insert_dough(dough);
        self
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.insert_product(product);
        self
    }

    pub fn dough(&self, recipe_id: RecipeId) -> EngineResult<&Dough> {
        self.doughs
            .get(&recipe_id)
            .ok_or(EngineError::MissingRecipe { recipe_id })
    }

    pub fn product(&self, product_id: ProductId) -> EngineResult<&Product> {
        self.products
            .get(&product_id)
            .ok_or(EngineError::MissingProduct { product_id })
    }

    pub fn doughs(&self) -> impl Iterator<Item = &Dough> {
        self.doughs.values()
    }

    pub fn dough_count(&self) -> usize {
        self.doughs.len()
    }

    /// Depth of the pre-dough graph below `recipe_id`.
    ///
    /// A dough without pre-doughs has depth 0. Fails on cycles and on
    /// references missing from the snapshot.
    pub fn composition_depth(&self, recipe_id: RecipeId) -> EngineResult<usize> {
        let mut memo = HashMap::new();
        let mut path = Vec::new();
        self.depth_of(recipe_id, &mut path, &mut memo)
    }

    fn depth_of(
        &self,
        recipe_id: RecipeId,
        path: &mut Vec<RecipeId>,
        memo: &mut HashMap<RecipeId, usize>,
    ) -> EngineResult<usize> {
        if let Some(depth) = memo.get(&recipe_id) {
            return Ok(*depth);
        }
        if path.contains(&recipe_id) {
            let mut cycle = path.clone();
            cycle.push(recipe_id);
            return Err(EngineError::CyclicComposition { recipe_id, path: cycle });
        }

        let dough = self.dough(recipe_id)?;
        path.push(recipe_id);
        let mut depth = 0;
        for row in dough.pre_dough_rows() {
            depth = depth.max(self.depth_of(row.recipe_id, path, memo)? + 1);
        }
        path.pop();

        memo.insert(recipe_id, depth);
        Ok(depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn test_direct_ratio_sum_ignores_pre_doughs() {
        let dough = Dough::new(id(1), "Main")
            .with_component(ComponentIngredient::flour(id(10), Decimal::new(80, 2)))
            .with_component(ComponentIngredient::wet(id(11), Decimal::new(60, 2), Decimal::ONE))
            .with_component(ComponentIngredient::pre_dough(id(2), Decimal::new(20, 2)));
        assert_eq!(dough.direct_ratio_sum(), Decimal::new(140, 2));
        assert_eq!(dough.pre_dough_rows().count(), 1);
    }

    #[test]
    fn test_composition_depth() {
        let book = RecipeBook::new()
            .with_dough(Dough::new(id(1), "Main").with_component(ComponentIngredient::pre_dough(id(2), Decimal::ONE)))
            .with_dough(Dough::new(id(2), "Levain").with_component(ComponentIngredient::pre_dough(id(3), Decimal::ONE)))
            .with_dough(Dough::new(id(3), "Starter").with_component(ComponentIngredient::flour(id(10), Decimal::ONE)));
        assert_eq!(book.composition_depth(id(1)).unwrap(), 2);
        assert_eq!(book.composition_depth(id(3)).unwrap(), 0);
    }

    #[test]
    fn test_composition_depth_detects_cycle() {
        let book = RecipeBook::new()
            .with_dough(Dough::new(id(1), "A").with_component(ComponentIngredient::pre_dough(id(2), Decimal::ONE)))
            .with_dough(Dough::new(id(2), "B").with_component(ComponentIngredient::pre_dough(id(1), Decimal::ONE)));
        match book.composition_depth(id(1)) {
            Err(EngineError::CyclicComposition { path, .. }) => {
                assert_eq!(path, vec![id(1), id(2), id(1)]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_shared_pre_dough_is_not_a_cycle() {
        let book = RecipeBook::new()
            .with_dough(
                Dough::new(id(1), "Main")
                    .with_component(ComponentIngredient::pre_dough(id(2), Decimal::new(1, 1)))
                    .with_component(ComponentIngredient::pre_dough(id(3), Decimal::new(1, 1))),
            )
            .with_dough(Dough::new(id(2), "Poolish").with_component(ComponentIngredient::pre_dough(id(4), Decimal::ONE)))
            .with_dough(Dough::new(id(3), "Biga").with_component(ComponentIngredient::pre_dough(id(4), Decimal::ONE)))
            .with_dough(Dough::new(id(4), "Starter").with_component(ComponentIngredient::flour(id(10), Decimal::ONE)));
        assert_eq!(book.composition_depth(id(1)).unwrap(), 2);
    }

    #[test]
    fn test_missing_recipe() {
        let book = RecipeBook::new();
        assert_eq!(
            book.dough(id(7)).unwrap_err(),
            EngineError::MissingRecipe { recipe_id: id(7) }
        );
    }

    #[test]
    fn test_component_serde_tagging() {
        let row = ComponentIngredient::pre_dough(id(2), Decimal::new(28, 2));
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["kind"], "pre_dough");
        let back: ComponentIngredient = serde_json::from_value(json).unwrap();
        assert_eq!(back, row);
    }
}
