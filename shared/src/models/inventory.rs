//! Inventory models: stock records and the immutable ledger events

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::IngredientId;

/// A base material with its derived stock fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub current_stock_in_grams: Decimal,
    /// Monetary value of the stock on hand
    pub current_stock_value: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Ingredient {
    pub fn snapshot(&self) -> StockSnapshot {
        StockSnapshot {
            ingredient_id: self.id,
            quantity_grams: self.current_stock_in_grams,
            value: self.current_stock_value,
        }
    }
}

/// Quantity and value of one ingredient at a point in time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StockSnapshot {
    pub ingredient_id: IngredientId,
    pub quantity_grams: Decimal,
    pub value: Decimal,
}

impl StockSnapshot {
    pub fn empty(ingredient_id: IngredientId) -> Self {
        Self {
            ingredient_id,
            quantity_grams: Decimal::ZERO,
            value: Decimal::ZERO,
        }
    }

    pub fn new(ingredient_id: IngredientId, quantity_grams: Decimal, value: Decimal) -> Self {
        Self {
            ingredient_id,
            quantity_grams,
            value,
        }
    }

    /// Weighted-average cost per gram; zero when nothing is on hand
    pub fn unit_cost(&self) -> Decimal {
        if self.quantity_grams.is_zero() {
            Decimal::ZERO
        } else {
            self.value / self.quantity_grams
        }
    }
}

/// Kinds of entries in the stock ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    Procurement,
    Consumption,
    Adjustment,
    InitialStocking,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::Procurement => "procurement",
            LedgerEntryType::Consumption => "consumption",
            LedgerEntryType::Adjustment => "adjustment",
            LedgerEntryType::InitialStocking => "initial_stocking",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "procurement" => Some(LedgerEntryType::Procurement),
            "consumption" => Some(LedgerEntryType::Consumption),
            "adjustment" => Some(LedgerEntryType::Adjustment),
            "initial_stocking" => Some(LedgerEntryType::InitialStocking),
            _ => None,
        }
    }
}

/// A purchase of packaged stock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcurementRecord {
    pub id: Uuid,
    pub ingredient_id: IngredientId,
    pub packages: Decimal,
    /// Grams per package
    pub spec_weight_grams: Decimal,
    pub price_per_package: Decimal,
    pub supplier: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A manual correction of stock (found stock, spoilage, initial count)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub id: Uuid,
    pub ingredient_id: IngredientId,
    pub delta_grams: Decimal,
    pub reason: String,
    /// Set only for initial stocking
    pub unit_cost: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Grams drawn by a completed production task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionLog {
    pub id: Uuid,
    pub ingredient_id: IngredientId,
    pub task_id: Uuid,
    pub grams: Decimal,
    /// Value removed from stock at the weighted-average cost of the moment
    pub value: Decimal,
    pub created_at: DateTime<Utc>,
}
