//! Recipe loading service
//!
//! Reads a product's dough, every pre-dough reachable from it and every
//! extra it references into an in-memory [`RecipeBook`]. Calculations run
//! against that snapshot and never go back to the database.

use std::collections::{HashSet, VecDeque};

use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use bakery_shared::{
    validate_composition, validate_dough, validate_product, BaseIngredientRow, ComponentIngredient, Dough,
    EngineError, Product, ProductEntry, RecipeBook, RecipeId,
};

use crate::error::{AppError, AppResult};

/// Recipe service building calculation snapshots
#[derive(Clone)]
pub struct RecipeService {
    db: PgPool,
    max_depth: usize,
}

/// Row for product lookup
#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    base_weight: Decimal,
    recipe_version_id: Uuid,
}

/// Row for a product's mix-ins and fillings
#[derive(Debug, FromRow)]
struct ProductEntryRow {
    entry_kind: String,
    ingredient_id: Option<Uuid>,
    extra_family_id: Option<Uuid>,
    amount: Decimal,
}

/// Row for the dough of a recipe version
#[derive(Debug, FromRow)]
struct ComponentRow {
    id: Uuid,
    family_id: Uuid,
    name: String,
    loss_ratio: Decimal,
    target_temperature: Option<Decimal>,
}

/// Row for one line of a dough
#[derive(Debug, FromRow)]
struct ComponentIngredientRow {
    ingredient_id: Option<Uuid>,
    ratio: Option<Decimal>,
    is_flour: bool,
    water_content: Decimal,
    pre_dough_family_id: Option<Uuid>,
    flour_ratio: Option<Decimal>,
}

/// Where a product entry is listed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    MixIn,
    Filling,
}

fn component_from_row(row: ComponentIngredientRow) -> AppResult<ComponentIngredient> {
    match (row.ingredient_id, row.ratio, row.pre_dough_family_id, row.flour_ratio) {
        (Some(ingredient_id), Some(ratio), None, None) => Ok(ComponentIngredient::Base(BaseIngredientRow {
            ingredient_id,
            ratio,
            is_flour: row.is_flour,
            water_content: row.water_content,
        })),
        (None, None, Some(recipe_id), Some(flour_ratio)) => Ok(ComponentIngredient::pre_dough(recipe_id, flour_ratio)),
        _ => Err(AppError::Internal(
            "Component row must bind exactly one ingredient or pre-dough".to_string(),
        )),
    }
}

fn entry_from_row(row: ProductEntryRow) -> AppResult<(EntryKind, ProductEntry)> {
    let kind = match row.entry_kind.as_str() {
        "mix_in" => EntryKind::MixIn,
        "filling" => EntryKind::Filling,
        other => return Err(AppError::Internal(format!("Unknown product entry kind: {}", other))),
    };
    let entry = match (row.ingredient_id, row.extra_family_id) {
        (Some(ingredient_id), None) => ProductEntry::ingredient(ingredient_id, row.amount),
        (None, Some(recipe_id)) => ProductEntry::extra(recipe_id, row.amount),
        _ => {
            return Err(AppError::Internal(
                "Product entry must reference an ingredient or an extra".to_string(),
            ))
        }
    };
    Ok((kind, entry))
}

fn check_dough(dough: &Dough) -> AppResult<()> {
    validate_dough(dough).map_err(|msg| AppError::validation("recipe", msg))
}

impl RecipeService {
    /// Create a new RecipeService; `max_depth` bounds pre-dough nesting
    pub fn new(db: PgPool, max_depth: usize) -> Self {
        Self { db, max_depth }
    }

    /// Load a product and everything its calculation touches
    pub async fn load_product_book(&self, product_id: Uuid) -> AppResult<RecipeBook> {
        let (product, version_id) = self.load_product(product_id).await?;
        validate_product(&product).map_err(|msg| AppError::validation("product", msg))?;

        let main = self.load_version_dough(version_id).await?;
        check_dough(&main)?;

        let mut book = RecipeBook::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        visited.insert(main.recipe_id);
        queue.extend(main.pre_dough_rows().map(|row| (row.recipe_id, 1)));
        queue.extend(product.extra_ids().map(|id| (id, 0)));
        let dough_id = main.recipe_id;
        book.insert_dough(main);

        // Breadth-first over pre-dough references; the visited set stops
        // reloading shared or cyclic recipes, the depth bound stops runaway chains.
        while let Some((recipe_id, depth)) = queue.pop_front() {
            if !visited.insert(recipe_id) {
                continue;
            }
            if depth > self.max_depth {
                return Err(EngineError::CompositionTooDeep {
                    recipe_id,
                    max_depth: self.max_depth,
                }
                .into());
            }
            let dough = self.load_active_dough(recipe_id).await?;
            check_dough(&dough)?;
            for row in dough.pre_dough_rows() {
                if !visited.contains(&row.recipe_id) {
                    queue.push_back((row.recipe_id, depth + 1));
                }
            }
            book.insert_dough(dough);
        }

        validate_composition(&book, dough_id, self.max_depth)?;
        for extra_id in product.extra_ids() {
            validate_composition(&book, extra_id, self.max_depth)?;
        }

        tracing::debug!(
            %product_id,
            doughs = book.dough_count(),
            "Recipe book loaded"
        );

        book.insert_product(product);
        Ok(book)
    }

    /// Load a product row with its entries; also returns the recipe version it uses
    async fn load_product(&self, product_id: Uuid) -> AppResult<(Product, Uuid)> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT p.id, p.name, p.base_weight, p.recipe_version_id
            FROM products p
            WHERE p.id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(EngineError::MissingProduct { product_id })?;

        let family_id = sqlx::query_scalar::<_, Uuid>("SELECT family_id FROM recipe_versions WHERE id = $1")
            .bind(row.recipe_version_id)
            .fetch_one(&self.db)
            .await?;

        let entry_rows = sqlx::query_as::<_, ProductEntryRow>(
            r#"
            SELECT entry_kind, ingredient_id, extra_family_id, amount
            FROM product_entries
            WHERE product_id = $1
            ORDER BY position
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        let mut product = Product::new(row.id, row.name, family_id, row.base_weight);
        for entry_row in entry_rows {
            product = match entry_from_row(entry_row)? {
                (EntryKind::MixIn, entry) => product.with_mix_in(entry),
                (EntryKind::Filling, entry) => product.with_filling(entry),
            };
        }

        Ok((product, row.recipe_version_id))
    }

    /// Load the active version of a recipe family
    async fn load_active_dough(&self, recipe_id: RecipeId) -> AppResult<Dough> {
        let version_id = sqlx::query_scalar::<_, Option<Uuid>>(
            "SELECT active_version_id FROM recipe_families WHERE id = $1",
        )
        .bind(recipe_id)
        .fetch_optional(&self.db)
        .await?
        .flatten()
        .ok_or(EngineError::MissingRecipe { recipe_id })?;

        self.load_version_dough(version_id).await
    }

    /// Load the dough of a specific recipe version, keyed by its family id
    async fn load_version_dough(&self, version_id: Uuid) -> AppResult<Dough> {
        let component = sqlx::query_as::<_, ComponentRow>(
            r#"
            SELECT c.id, v.family_id, f.name, c.loss_ratio, c.target_temperature
            FROM recipe_components c
            JOIN recipe_versions v ON v.id = c.recipe_version_id
            JOIN recipe_families f ON f.id = v.family_id
            WHERE c.recipe_version_id = $1
            "#,
        )
        .bind(version_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe version".to_string()))?;

        let rows = sqlx::query_as::<_, ComponentIngredientRow>(
            r#"
            SELECT ingredient_id, ratio, is_flour, water_content, pre_dough_family_id, flour_ratio
            FROM component_ingredients
            WHERE component_id = $1
            ORDER BY position
            "#,
        )
        .bind(component.id)
        .fetch_all(&self.db)
        .await?;

        let mut dough = Dough::new(component.family_id, component.name).with_loss_ratio(component.loss_ratio);
        if let Some(temperature) = component.target_temperature {
            dough = dough.with_target_temperature(temperature);
        }
        for row in rows {
            dough = dough.with_component(component_from_row(row)?);
        }
        Ok(dough)
    }
}
