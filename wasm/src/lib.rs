//! WebAssembly module for bakery production previews
//!
//! Provides client-side computation for:
//! - Dough temperature and ice advice
//! - Flour weight resolution, strict or for display
//! - Production requirement and mixing sheet previews
//! - Offline recipe validation
//!
//! Recipes arrive as a JSON-encoded `RecipeBook`; results go back as JSON.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

use bakery_shared::{
    calculate_production, compute_thermals, flour_weight_or_zero, ice_substitution, mixing_sheets,
    required_water_temperature, resolve_flour_weight, validate_composition, validate_loss_ratio, RecipeBook,
    ThermalContext, ThermalInputs, MAX_COMPOSITION_DEPTH,
};

fn to_decimal(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn js_error(message: String) -> JsValue {
    js_sys::Error::new(&message).into()
}

/// Log to the browser console; native builds (tests) stay silent
fn console_warn(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::warn_1(&JsValue::from_str(message));
    #[cfg(not(target_arch = "wasm32"))]
    let _ = message;
}

fn parse_book(book_json: &str) -> Result<RecipeBook, String> {
    serde_json::from_str(book_json).map_err(|e| format!("Invalid recipe book JSON: {}", e))
}

fn parse_id(id: &str) -> Result<Uuid, String> {
    Uuid::parse_str(id).map_err(|e| format!("Invalid id {}: {}", id, e))
}

fn thermals_json(inputs_json: &str) -> Result<String, String> {
    let inputs: ThermalInputs =
        serde_json::from_str(inputs_json).map_err(|e| format!("Invalid thermal inputs JSON: {}", e))?;
    serde_json::to_string(&compute_thermals(&inputs)).map_err(|e| e.to_string())
}

fn flour_weight(book_json: &str, recipe_id: &str, piece_weight: f64) -> Result<Decimal, String> {
    let book = parse_book(book_json)?;
    let recipe_id = parse_id(recipe_id)?;
    validate_composition(&book, recipe_id, MAX_COMPOSITION_DEPTH).map_err(|e| e.to_string())?;
    resolve_flour_weight(&book, recipe_id, to_decimal(piece_weight)).map_err(|e| e.to_string())
}

fn display_weight(book_json: &str, recipe_id: &str, piece_weight: f64) -> Decimal {
    match parse_book(book_json).and_then(|book| Ok((book, parse_id(recipe_id)?))) {
        Ok((book, recipe_id)) => flour_weight_or_zero(&book, recipe_id, to_decimal(piece_weight)),
        Err(message) => {
            console_warn(&message);
            Decimal::ZERO
        }
    }
}

fn production_json(book_json: &str, product_id: &str, planned_piece_count: u32) -> Result<String, String> {
    let book = parse_book(book_json)?;
    let product_id = parse_id(product_id)?;
    let requirement = calculate_production(&book, product_id, planned_piece_count).map_err(|e| e.to_string())?;
    serde_json::to_string(&requirement).map_err(|e| e.to_string())
}

fn sheets_json(
    book_json: &str,
    recipe_id: &str,
    flour_weight: f64,
    context_json: Option<String>,
) -> Result<String, String> {
    let book = parse_book(book_json)?;
    let recipe_id = parse_id(recipe_id)?;
    let context = context_json
        .map(|json| serde_json::from_str::<ThermalContext>(&json))
        .transpose()
        .map_err(|e| format!("Invalid thermal context JSON: {}", e))?;
    let sheets = mixing_sheets(&book, recipe_id, to_decimal(flour_weight), context.as_ref())
        .map_err(|e| e.to_string())?;
    serde_json::to_string(&sheets).map_err(|e| e.to_string())
}

/// Required mixing-water temperature in °C
#[wasm_bindgen]
pub fn calculate_required_water_temp(
    target_dough_temp: f64,
    mixer_friction: f64,
    flour_temp: f64,
    ambient_temp: f64,
) -> f64 {
    to_f64(required_water_temperature(
        to_decimal(target_dough_temp),
        to_decimal(mixer_friction),
        to_decimal(flour_temp),
        to_decimal(ambient_temp),
    ))
}

/// Grams of ice replacing water; zero when no cooling is needed
#[wasm_bindgen]
pub fn calculate_ice_substitution(required_water_temp: f64, total_water_grams: f64, current_water_temp: f64) -> f64 {
    to_f64(ice_substitution(
        to_decimal(required_water_temp),
        to_decimal(total_water_grams),
        to_decimal(current_water_temp),
    ))
}

/// Full thermal report for a JSON-encoded `ThermalInputs`
#[wasm_bindgen]
pub fn calculate_thermals(inputs_json: &str) -> Result<String, JsValue> {
    thermals_json(inputs_json).map_err(js_error)
}

/// Flour weight for one piece of a dough
#[wasm_bindgen]
pub fn calculate_flour_weight(book_json: &str, recipe_id: &str, piece_weight: f64) -> Result<f64, JsValue> {
    flour_weight(book_json, recipe_id, piece_weight)
        .map(to_f64)
        .map_err(js_error)
}

/// Flour weight for a recipe card label; zero when the recipe is malformed
#[wasm_bindgen]
pub fn display_flour_weight(book_json: &str, recipe_id: &str, piece_weight: f64) -> f64 {
    to_f64(display_weight(book_json, recipe_id, piece_weight))
}

/// Production requirement preview as JSON
#[wasm_bindgen]
pub fn preview_production(book_json: &str, product_id: &str, planned_piece_count: u32) -> Result<String, JsValue> {
    production_json(book_json, product_id, planned_piece_count).map_err(js_error)
}

/// Mixing sheets preview as JSON, with thermal advice when a context is given
#[wasm_bindgen]
pub fn preview_mixing_sheets(
    book_json: &str,
    recipe_id: &str,
    flour_weight: f64,
    context_json: Option<String>,
) -> Result<String, JsValue> {
    sheets_json(book_json, recipe_id, flour_weight, context_json).map_err(js_error)
}

/// Check a loss ratio before saving a recipe
#[wasm_bindgen]
pub fn is_valid_loss_ratio(loss_ratio: f64) -> bool {
    validate_loss_ratio(to_decimal(loss_ratio)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakery_shared::{ComponentIngredient, Dough, Product, ProductionRequirement};

    fn book_json() -> String {
        let id = Uuid::from_u128;
        let book = RecipeBook::new()
            .with_dough(
                Dough::new(id(1), "Country loaf")
                    .with_target_temperature(Decimal::from(25))
                    .with_component(ComponentIngredient::flour(id(10), Decimal::ONE))
                    .with_component(ComponentIngredient::wet(id(11), Decimal::new(7, 1), Decimal::ONE)),
            )
            .with_product(Product::new(id(100), "Loaf", id(1), Decimal::from(850)));
        serde_json::to_string(&book).unwrap()
    }

    #[test]
    fn test_required_water_temp() {
        assert!((calculate_required_water_temp(26.0, 1.0, 24.0, 25.0) - 26.0).abs() < 0.001);
    }

    #[test]
    fn test_ice_substitution() {
        assert_eq!(calculate_ice_substitution(26.0, 1000.0, 20.0), 0.0);
        let ice = calculate_ice_substitution(10.0, 1000.0, 30.0);
        assert!((ice - 181.818).abs() < 0.01);
    }

    #[test]
    fn test_flour_weight_from_json() {
        // 850 / 1.7 = 500
        let flour = flour_weight(&book_json(), &Uuid::from_u128(1).to_string(), 850.0).unwrap();
        assert_eq!(flour, Decimal::from(500));
    }

    #[test]
    fn test_display_weight_degrades_to_zero() {
        let loaf = Uuid::from_u128(1).to_string();
        assert_eq!(display_weight(&book_json(), &loaf, 850.0), Decimal::from(500));
        assert_eq!(display_weight(&book_json(), &Uuid::from_u128(9).to_string(), 850.0), Decimal::ZERO);
        assert_eq!(display_weight("not json", &loaf, 850.0), Decimal::ZERO);
    }

    #[test]
    fn test_production_preview() {
        let json = production_json(&book_json(), &Uuid::from_u128(100).to_string(), 2).unwrap();
        let requirement: ProductionRequirement = serde_json::from_str(&json).unwrap();
        assert_eq!(requirement.weights[&Uuid::from_u128(10)], Decimal::from(1000));
        assert_eq!(requirement.weights[&Uuid::from_u128(11)], Decimal::from(700));
    }

    #[test]
    fn test_sheets_preview_with_context() {
        let context = r#"{"mixer_friction_factor":"1","flour_temperature":"24","ambient_temperature":"25","water_temperature":"30"}"#;
        let json = sheets_json(
            &book_json(),
            &Uuid::from_u128(1).to_string(),
            500.0,
            Some(context.to_string()),
        )
        .unwrap();
        assert!(json.contains("required_water_temperature"));
    }

    #[test]
    fn test_bad_input_is_reported() {
        assert!(parse_book("not json").is_err());
        assert!(production_json(&book_json(), "nope", 1).is_err());
        assert!(thermals_json("{}").is_err());
    }

    #[test]
    fn test_loss_ratio_check() {
        assert!(is_valid_loss_ratio(0.05));
        assert!(!is_valid_loss_ratio(1.0));
        assert!(!is_valid_loss_ratio(-0.1));
    }
}
