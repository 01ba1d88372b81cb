//! Weighted-average stock valuation
//!
//! Each event moves quantity and value together. Applying an event is pure:
//! it reads a snapshot and returns the next one. Persisting the result
//! atomically is the caller's job.
//!
//! Stored stock keeps [`STOCK_SCALE`] decimal places. Every amount is rounded
//! to that scale as it enters the ledger, so a snapshot written to the
//! database and a replay of the journaled events agree exactly.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult, StockShortage};
use crate::models::{LedgerEntryType, StockSnapshot};
use crate::types::{IngredientId, WeightMap};
use crate::validation::validate_adjustment_reason;

/// Decimal places kept for stock grams and value
pub const STOCK_SCALE: u32 = 6;

/// Stock quantity and value must stay below 10^14
pub const MAX_STOCK_AMOUNT: Decimal = Decimal::from_parts(0x107A_4000, 0x5AF3, 0, false, 0);

/// Round an amount to the stored stock scale, halves away from zero
pub fn to_stock_scale(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(STOCK_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// A stock-changing event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Procurement {
        packages: Decimal,
        spec_weight_grams: Decimal,
        price_per_package: Decimal,
    },
    Consumption {
        grams: Decimal,
    },
    /// Positive for found stock, negative for spoilage or loss
    Adjustment {
        delta_grams: Decimal,
        reason: Option<String>,
    },
    /// First count of an ingredient with nothing on hand
    InitialStocking {
        grams: Decimal,
        unit_cost: Option<Decimal>,
        reason: Option<String>,
    },
}

impl LedgerEvent {
    pub fn entry_type(&self) -> LedgerEntryType {
        match self {
            LedgerEvent::Procurement { .. } => LedgerEntryType::Procurement,
            LedgerEvent::Consumption { .. } => LedgerEntryType::Consumption,
            LedgerEvent::Adjustment { .. } => LedgerEntryType::Adjustment,
            LedgerEvent::InitialStocking { .. } => LedgerEntryType::InitialStocking,
        }
    }
}

/// Result of applying one event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerOutcome {
    pub before: StockSnapshot,
    pub after: StockSnapshot,
    pub quantity_delta: Decimal,
    pub value_delta: Decimal,
    /// Value would have gone negative and was held at zero
    pub value_clamped: bool,
    /// A removal exceeded stock and was limited to what was on hand
    pub quantity_clamped: bool,
}

/// Apply one event to a snapshot
pub fn apply_ledger_event(snapshot: &StockSnapshot, event: &LedgerEvent) -> EngineResult<LedgerOutcome> {
    let ingredient_id = snapshot.ingredient_id;
    match event {
        LedgerEvent::Procurement {
            packages,
            spec_weight_grams,
            price_per_package,
        } => {
            if *packages <= Decimal::ZERO || *spec_weight_grams <= Decimal::ZERO {
                return Err(invalid_event(ingredient_id, "Packages and package weight must be positive"));
            }
            if *price_per_package < Decimal::ZERO {
                return Err(invalid_event(ingredient_id, "Package price cannot be negative"));
            }
            let grams = in_range(ingredient_id, packages.checked_mul(*spec_weight_grams))?;
            let value = in_range(ingredient_id, packages.checked_mul(*price_per_package))?;
            add_stock(snapshot, grams, value)
        }
        LedgerEvent::Consumption { grams } => {
            let grams = to_stock_scale(*grams);
            if grams < Decimal::ZERO {
                return Err(invalid_event(ingredient_id, "Consumed grams cannot be negative"));
            }
            if grams > snapshot.quantity_grams {
                return Err(EngineError::InsufficientStock {
                    shortages: vec![StockShortage {
                        ingredient_id,
                        required_grams: grams,
                        available_grams: snapshot.quantity_grams,
                    }],
                });
            }
            remove_stock(snapshot, grams)
        }
        LedgerEvent::Adjustment { delta_grams, reason } => {
            check_reason(ingredient_id, reason.as_deref())?;
            let delta_grams = to_stock_scale(*delta_grams);
            if delta_grams.is_zero() {
                return Err(invalid_adjustment(ingredient_id, "Adjustment delta cannot be zero"));
            }
            if delta_grams > Decimal::ZERO {
                if snapshot.quantity_grams.is_zero() {
                    return Err(invalid_adjustment(
                        ingredient_id,
                        "Stock is empty; record an initial stocking with a unit cost instead",
                    ));
                }
                let value = in_range(ingredient_id, delta_grams.checked_mul(average_cost(snapshot)?))?;
                add_stock(snapshot, delta_grams, value)
            } else {
                remove_stock(snapshot, -delta_grams)
            }
        }
        LedgerEvent::InitialStocking {
            grams,
            unit_cost,
            reason,
        } => {
            check_reason(ingredient_id, reason.as_deref())?;
            if !snapshot.quantity_grams.is_zero() {
                return Err(invalid_adjustment(
                    ingredient_id,
                    "Initial stocking is only valid when current stock is zero",
                ));
            }
            let unit_cost = match unit_cost {
                Some(cost) if *cost >= Decimal::ZERO => *cost,
                Some(_) => return Err(invalid_adjustment(ingredient_id, "Unit cost cannot be negative")),
                None => return Err(invalid_adjustment(ingredient_id, "Initial stocking requires a unit cost")),
            };
            if to_stock_scale(*grams) <= Decimal::ZERO {
                return Err(invalid_adjustment(ingredient_id, "Initial stock must be positive"));
            }
            let value = in_range(ingredient_id, grams.checked_mul(unit_cost))?;
            add_stock(snapshot, *grams, value)
        }
    }
}

fn add_stock(snapshot: &StockSnapshot, grams: Decimal, value: Decimal) -> EngineResult<LedgerOutcome> {
    let ingredient_id = snapshot.ingredient_id;
    let quantity = in_range(ingredient_id, snapshot.quantity_grams.checked_add(to_stock_scale(grams)))?;
    let value = in_range(ingredient_id, snapshot.value.checked_add(to_stock_scale(value)))?;
    let after = StockSnapshot::new(ingredient_id, to_stock_scale(quantity), to_stock_scale(value));
    if after.quantity_grams >= MAX_STOCK_AMOUNT || after.value >= MAX_STOCK_AMOUNT {
        return Err(invalid_event(ingredient_id, "Stock would exceed the storable range"));
    }
    Ok(outcome(snapshot, after, false, false))
}

/// Draw `grams` at the current weighted-average cost.
///
/// Removals beyond stock are limited to what is on hand. Emptying the stock
/// takes the whole remaining value so no residue from division survives.
fn remove_stock(snapshot: &StockSnapshot, grams: Decimal) -> EngineResult<LedgerOutcome> {
    let ingredient_id = snapshot.ingredient_id;
    let quantity_clamped = grams > snapshot.quantity_grams;
    let removed = grams.min(snapshot.quantity_grams);
    let quantity = to_stock_scale(snapshot.quantity_grams - removed);

    let mut value = if quantity.is_zero() {
        Decimal::ZERO
    } else {
        let drawn = in_range(ingredient_id, removed.checked_mul(average_cost(snapshot)?))?;
        to_stock_scale(in_range(ingredient_id, snapshot.value.checked_sub(drawn))?)
    };

    let value_clamped = value < Decimal::ZERO;
    if value_clamped {
        tracing::warn!(
            %ingredient_id,
            %value,
            "stock value would go negative, holding at zero"
        );
        value = Decimal::ZERO;
    }
    if quantity_clamped {
        tracing::warn!(
            %ingredient_id,
            requested = %grams,
            available = %snapshot.quantity_grams,
            "removal exceeds stock, clamping quantity at zero"
        );
    }

    let after = StockSnapshot::new(ingredient_id, quantity, value);
    Ok(outcome(snapshot, after, value_clamped, quantity_clamped))
}

fn outcome(before: &StockSnapshot, after: StockSnapshot, value_clamped: bool, quantity_clamped: bool) -> LedgerOutcome {
    LedgerOutcome {
        before: *before,
        after,
        quantity_delta: after.quantity_grams - before.quantity_grams,
        value_delta: after.value - before.value,
        value_clamped,
        quantity_clamped,
    }
}

fn average_cost(snapshot: &StockSnapshot) -> EngineResult<Decimal> {
    if snapshot.quantity_grams.is_zero() {
        Ok(Decimal::ZERO)
    } else {
        in_range(snapshot.ingredient_id, snapshot.value.checked_div(snapshot.quantity_grams))
    }
}

fn in_range(ingredient_id: IngredientId, amount: Option<Decimal>) -> EngineResult<Decimal> {
    amount.ok_or_else(|| invalid_event(ingredient_id, "Amount is too large to value"))
}

fn check_reason(ingredient_id: IngredientId, reason: Option<&str>) -> EngineResult<()> {
    validate_adjustment_reason(reason).map_err(|message| invalid_adjustment(ingredient_id, message))
}

fn invalid_adjustment(ingredient_id: IngredientId, message: &str) -> EngineError {
    EngineError::InvalidAdjustment {
        ingredient_id,
        message: message.to_string(),
    }
}

fn invalid_event(ingredient_id: IngredientId, message: &str) -> EngineError {
    EngineError::InvalidLedgerEvent {
        ingredient_id,
        message: message.to_string(),
    }
}

/// Verify every required ingredient is covered by stock on hand.
///
/// Ingredients without a snapshot count as empty. Requirements are compared
/// at the stock scale. All shortages are reported together.
pub fn check_projected_stock(
    stocks: &HashMap<IngredientId, StockSnapshot>,
    required: &WeightMap,
) -> EngineResult<()> {
    let shortages: Vec<StockShortage> = required
        .iter()
        .filter_map(|(ingredient_id, grams)| {
            let grams = to_stock_scale(*grams);
            let available = stocks
                .get(ingredient_id)
                .map(|s| s.quantity_grams)
                .unwrap_or(Decimal::ZERO);
            (grams > available).then(|| StockShortage {
                ingredient_id: *ingredient_id,
                required_grams: grams,
                available_grams: available,
            })
        })
        .collect();

    if shortages.is_empty() {
        Ok(())
    } else {
        Err(EngineError::InsufficientStock { shortages })
    }
}

/// Consumption outcomes for every required ingredient, or none at all
pub fn plan_consumption(
    stocks: &HashMap<IngredientId, StockSnapshot>,
    required: &WeightMap,
) -> EngineResult<Vec<LedgerOutcome>> {
    check_projected_stock(stocks, required)?;
    required
        .iter()
        .map(|(ingredient_id, grams)| {
            let snapshot = stocks
                .get(ingredient_id)
                .copied()
                .unwrap_or_else(|| StockSnapshot::empty(*ingredient_id));
            apply_ledger_event(&snapshot, &LedgerEvent::Consumption { grams: *grams })
        })
        .collect()
}

/// Re-derive a snapshot from an ordered event history
pub fn replay(ingredient_id: IngredientId, events: &[LedgerEvent]) -> EngineResult<StockSnapshot> {
    events
        .iter()
        .try_fold(StockSnapshot::empty(ingredient_id), |snapshot, event| {
            apply_ledger_event(&snapshot, event).map(|outcome| outcome.after)
        })
}

/// In-memory stock book applying events all-or-nothing.
///
/// Useful where no database transaction is available (previews, tests).
#[derive(Debug, Clone, Default)]
pub struct StockLedger {
    stocks: HashMap<IngredientId, StockSnapshot>,
    history: Vec<(IngredientId, LedgerEvent)>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, ingredient_id: IngredientId) -> StockSnapshot {
        self.stocks
            .get(&ingredient_id)
            .copied()
            .unwrap_or_else(|| StockSnapshot::empty(ingredient_id))
    }

    pub fn stocks(&self) -> &HashMap<IngredientId, StockSnapshot> {
        &self.stocks
    }

    pub fn history(&self) -> &[(IngredientId, LedgerEvent)] {
        &self.history
    }

    /// Apply one event and return the updated snapshot
    pub fn apply(&mut self, ingredient_id: IngredientId, event: LedgerEvent) -> EngineResult<StockSnapshot> {
        let outcome = apply_ledger_event(&self.snapshot(ingredient_id), &event)?;
        self.stocks.insert(ingredient_id, outcome.after);
        self.history.push((ingredient_id, event));
        Ok(outcome.after)
    }

    /// Consume a whole production requirement; nothing changes on failure
    pub fn consume(&mut self, required: &WeightMap) -> EngineResult<Vec<LedgerOutcome>> {
        let outcomes = plan_consumption(&self.stocks, required)?;
        for outcome in &outcomes {
            let ingredient_id = outcome.after.ingredient_id;
            self.stocks.insert(ingredient_id, outcome.after);
            self.history.push((
                ingredient_id,
                LedgerEvent::Consumption {
                    grams: -outcome.quantity_delta,
                },
            ));
        }
        Ok(outcomes)
    }

    /// Events recorded for one ingredient, oldest first
    pub fn events_for(&self, ingredient_id: IngredientId) -> Vec<LedgerEvent> {
        self.history
            .iter()
            .filter(|(id, _)| *id == ingredient_id)
            .map(|(_, event)| event.clone())
            .collect()
    }
}
