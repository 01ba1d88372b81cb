//! Recursive consumption calculation
//!
//! Walks a dough top-down, turning every ratio into grams and flattening
//! nested pre-doughs into per-ingredient totals. Product-level mix-ins and
//! fillings are resolved separately and merged into the same map.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::{BaseIngredientRow, ComponentIngredient, EntryTarget, Product, ProductEntry, RecipeBook};
use crate::resolver::{batch_flour_weight, resolve_flour_weight, resolve_product_flour_weight};
use crate::thermal::{compute_thermals, ThermalInputs, ThermalReport};
use crate::types::{accumulate, merge_weights, total_weight, IngredientId, ProductId, RecipeId, ThermalContext, WeightMap};

/// Hard bound on pre-dough nesting followed by the calculator.
///
/// Counted like [`RecipeBook::composition_depth`]: the top dough sits at
/// depth 0, so a chain may hold this many pre-doughs below it.
pub const MAX_COMPOSITION_DEPTH: usize = 32;

/// Flattened weights of one dough tree for one production run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConsumptionResult {
    pub weights: WeightMap,
    /// Grams from rows marked as flour
    pub flour_grams: Decimal,
    /// Grams of water carried by all rows
    pub water_grams: Decimal,
}

impl ConsumptionResult {
    fn add_row(&mut self, row: &BaseIngredientRow, grams: Decimal) {
        accumulate(&mut self.weights, row.ingredient_id, grams);
        if row.is_flour {
            self.flour_grams += grams;
        }
        self.water_grams += grams * row.water_content;
    }

    fn prune_zero(&mut self) {
        self.weights.retain(|_, grams| !grams.is_zero());
    }

    pub fn total_grams(&self) -> Decimal {
        total_weight(&self.weights)
    }

    pub fn grams_of(&self, ingredient_id: IngredientId) -> Decimal {
        self.weights.get(&ingredient_id).copied().unwrap_or(Decimal::ZERO)
    }

    /// Water over flour; `None` for doughs without flour rows
    pub fn hydration(&self) -> Option<Decimal> {
        if self.flour_grams > Decimal::ZERO {
            Some(self.water_grams / self.flour_grams)
        } else {
            None
        }
    }
}

/// Flatten the dough `recipe_id` scaled from `flour_weight` grams of flour
pub fn flatten_consumption(
    book: &RecipeBook,
    recipe_id: RecipeId,
    flour_weight: Decimal,
) -> EngineResult<ConsumptionResult> {
    let mut result = ConsumptionResult::default();
    let mut path = Vec::new();
    flatten_into(book, recipe_id, flour_weight, &mut path, &mut result)?;
    result.prune_zero();

    tracing::debug!(
        %recipe_id,
        %flour_weight,
        ingredients = result.weights.len(),
        total_grams = %result.total_grams(),
        "flattened dough"
    );
    Ok(result)
}

fn flatten_into(
    book: &RecipeBook,
    recipe_id: RecipeId,
    flour_weight: Decimal,
    path: &mut Vec<RecipeId>,
    acc: &mut ConsumptionResult,
) -> EngineResult<()> {
    enter(recipe_id, path)?;
    if flour_weight < Decimal::ZERO {
        return Err(EngineError::InvalidRatio {
            recipe_id,
            value: flour_weight,
        });
    }

    let dough = book.dough(recipe_id)?;
    for component in &dough.components {
        let ratio = component.raw_ratio();
        if ratio < Decimal::ZERO {
            return Err(EngineError::InvalidRatio {
                recipe_id,
                value: ratio,
            });
        }
        match component {
            ComponentIngredient::Base(row) => acc.add_row(row, flour_weight * row.ratio),
            ComponentIngredient::PreDough(row) => {
                flatten_into(book, row.recipe_id, flour_weight * row.flour_ratio, path, acc)?;
            }
        }
    }

    path.pop();
    Ok(())
}

/// Push `recipe_id` on the walk path, refusing cycles and runaway depth
fn enter(recipe_id: RecipeId, path: &mut Vec<RecipeId>) -> EngineResult<()> {
    if path.contains(&recipe_id) {
        let mut cycle = path.clone();
        cycle.push(recipe_id);
        return Err(EngineError::CyclicComposition {
            recipe_id,
            path: cycle,
        });
    }
    if path.len() > MAX_COMPOSITION_DEPTH {
        return Err(EngineError::CompositionTooDeep {
            recipe_id,
            max_depth: MAX_COMPOSITION_DEPTH,
        });
    }
    path.push(recipe_id);
    Ok(())
}

/// Base-ingredient grams for `grams` of an extra sub-recipe
pub fn extra_consumption(book: &RecipeBook, recipe_id: RecipeId, grams: Decimal) -> EngineResult<ConsumptionResult> {
    if grams.is_zero() {
        return Ok(ConsumptionResult::default());
    }
    let flour_weight = resolve_flour_weight(book, recipe_id, grams)?;
    flatten_consumption(book, recipe_id, flour_weight)
}

/// Grams drawn by a product's mix-ins and fillings for one batch.
///
/// Mix-ins scale with the batch flour weight, fillings and toppings with the
/// piece count.
pub fn product_entries_consumption(
    book: &RecipeBook,
    product: &Product,
    batch_flour_weight: Decimal,
    planned_piece_count: u32,
) -> EngineResult<WeightMap> {
    let pieces = Decimal::from(planned_piece_count);
    let mut weights = WeightMap::new();

    let lines = product
        .mix_ins
        .iter()
        .map(|entry| (entry, entry.amount * batch_flour_weight))
        .chain(product.fillings.iter().map(|entry| (entry, entry.amount * pieces)));

    for (entry, grams) in lines {
        add_entry(book, product.id, entry, grams, &mut weights)?;
    }

    weights.retain(|_, grams| !grams.is_zero());
    Ok(weights)
}

fn add_entry(
    book: &RecipeBook,
    product_id: ProductId,
    entry: &ProductEntry,
    grams: Decimal,
    weights: &mut WeightMap,
) -> EngineResult<()> {
    if entry.amount < Decimal::ZERO {
        let recipe_id = match entry.target {
            EntryTarget::Extra(recipe_id) => recipe_id,
            EntryTarget::Ingredient(_) => product_id,
        };
        return Err(EngineError::InvalidRatio {
            recipe_id,
            value: entry.amount,
        });
    }
    match entry.target {
        EntryTarget::Ingredient(ingredient_id) => accumulate(weights, ingredient_id, grams),
        EntryTarget::Extra(recipe_id) => {
            let extra = extra_consumption(book, recipe_id, grams)?;
            merge_weights(weights, &extra.weights);
        }
    }
    Ok(())
}

/// Everything a production run of one product draws from stock
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionRequirement {
    pub product_id: ProductId,
    pub dough_id: RecipeId,
    pub planned_piece_count: u32,
    pub flour_weight_per_piece: Decimal,
    pub batch_flour_weight: Decimal,
    /// The dough tree alone
    pub dough: ConsumptionResult,
    /// Mix-ins and fillings alone
    pub product_entries: WeightMap,
    /// Dough and product entries merged
    pub weights: WeightMap,
}

impl ProductionRequirement {
    pub fn total_grams(&self) -> Decimal {
        total_weight(&self.weights)
    }
}

/// Resolve flour weight, scale to the batch, flatten and merge product entries
pub fn calculate_production(
    book: &RecipeBook,
    product_id: ProductId,
    planned_piece_count: u32,
) -> EngineResult<ProductionRequirement> {
    let product = book.product(product_id)?;
    let per_piece = resolve_product_flour_weight(book, product)?;
    let batch = batch_flour_weight(per_piece, planned_piece_count);

    let dough = flatten_consumption(book, product.dough_id, batch)?;
    let product_entries = product_entries_consumption(book, product, batch, planned_piece_count)?;

    let mut weights = dough.weights.clone();
    merge_weights(&mut weights, &product_entries);

    Ok(ProductionRequirement {
        product_id,
        dough_id: product.dough_id,
        planned_piece_count,
        flour_weight_per_piece: per_piece,
        batch_flour_weight: batch,
        dough,
        product_entries,
        weights,
    })
}

/// A line on a mixing sheet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SheetRow {
    Ingredient {
        ingredient_id: IngredientId,
        grams: Decimal,
        is_flour: bool,
        water_grams: Decimal,
        #[serde(skip_serializing_if = "Option::is_none")]
        thermal: Option<ThermalReport>,
    },
    PreDough {
        recipe_id: RecipeId,
        name: String,
        /// Full mass of the pre-dough to add
        grams: Decimal,
    },
}

impl SheetRow {
    pub fn grams(&self) -> Decimal {
        match self {
            SheetRow::Ingredient { grams, .. } | SheetRow::PreDough { grams, .. } => *grams,
        }
    }
}

/// What to weigh out for one dough of the tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoughSheet {
    pub recipe_id: RecipeId,
    pub name: String,
    /// 0 for the main dough
    pub depth: usize,
    pub flour_weight: Decimal,
    pub total_grams: Decimal,
    pub rows: Vec<SheetRow>,
}

/// One sheet per dough, main dough first, then pre-doughs depth-first.
///
/// With a thermal context, the first pure-water row of every dough that has
/// a target temperature carries thermal advice.
pub fn mixing_sheets(
    book: &RecipeBook,
    recipe_id: RecipeId,
    flour_weight: Decimal,
    thermal: Option<&ThermalContext>,
) -> EngineResult<Vec<DoughSheet>> {
    let mut sheets = Vec::new();
    let mut path = Vec::new();
    build_sheet(book, recipe_id, flour_weight, thermal, &mut path, &mut sheets)?;
    Ok(sheets)
}

/// Builds the sheet for `recipe_id` and its pre-doughs, returning the total mass
fn build_sheet(
    book: &RecipeBook,
    recipe_id: RecipeId,
    flour_weight: Decimal,
    thermal: Option<&ThermalContext>,
    path: &mut Vec<RecipeId>,
    sheets: &mut Vec<DoughSheet>,
) -> EngineResult<Decimal> {
    enter(recipe_id, path)?;
    let depth = path.len() - 1;
    let dough = book.dough(recipe_id)?;

    let index = sheets.len();
    sheets.push(DoughSheet {
        recipe_id,
        name: dough.name.clone(),
        depth,
        flour_weight,
        total_grams: Decimal::ZERO,
        rows: Vec::with_capacity(dough.components.len()),
    });

    let mut rows = Vec::with_capacity(dough.components.len());
    let mut batch_water = Decimal::ZERO;
    for component in &dough.components {
        match component {
            ComponentIngredient::Base(row) => {
                let grams = flour_weight * row.ratio;
                let water_grams = grams * row.water_content;
                batch_water += water_grams;
                rows.push(SheetRow::Ingredient {
                    ingredient_id: row.ingredient_id,
                    grams,
                    is_flour: row.is_flour,
                    water_grams,
                    thermal: None,
                });
            }
            ComponentIngredient::PreDough(row) => {
                let pre_dough = book.dough(row.recipe_id)?;
                let grams = build_sheet(book, row.recipe_id, flour_weight * row.flour_ratio, thermal, path, sheets)?;
                rows.push(SheetRow::PreDough {
                    recipe_id: row.recipe_id,
                    name: pre_dough.name.clone(),
                    grams,
                });
            }
        }
    }
    path.pop();

    if let (Some(context), Some(target)) = (thermal, dough.target_temperature) {
        let whole = flatten_consumption(book, recipe_id, flour_weight)?;
        attach_thermals(&mut rows, target, context, batch_water, &whole);
    }

    let total: Decimal = rows.iter().map(SheetRow::grams).sum();
    let sheet = &mut sheets[index];
    sheet.total_grams = total;
    sheet.rows = rows;
    Ok(total)
}

fn attach_thermals(
    rows: &mut [SheetRow],
    target: Decimal,
    context: &ThermalContext,
    batch_water: Decimal,
    whole: &ConsumptionResult,
) {
    let water_row = rows.iter_mut().find(|row| match row {
        SheetRow::Ingredient { grams, water_grams, .. } => !grams.is_zero() && water_grams == grams,
        SheetRow::PreDough { .. } => false,
    });
    if let Some(SheetRow::Ingredient { water_grams, thermal, .. }) = water_row {
        let inputs = ThermalInputs::new(target, *context, batch_water)
            .with_row_water(*water_grams)
            .with_hydration(whole.water_grams, whole.flour_grams);
        *thermal = Some(compute_thermals(&inputs));
    }
}
