//! Inventory service for ingredient stock, valuation and the stock ledger
//!
//! Every stock change runs in one transaction: lock the ingredient row,
//! apply the ledger event in memory, write the new quantity and value, and
//! append the journal entry together with its procurement, adjustment or
//! consumption record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use bakery_shared::{
    apply_ledger_event, replay, validate_procurement, Ingredient, LedgerEntryType, LedgerEvent,
    LedgerOutcome, ProcurementRecord, StockAdjustment, StockSnapshot,
};

use crate::error::{AppError, AppResult};

/// Inventory service for managing ingredient stock
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
}

/// Row for ingredient queries
#[derive(Debug, FromRow)]
struct IngredientRow {
    id: Uuid,
    name: String,
    current_stock_in_grams: Decimal,
    current_stock_value: Decimal,
    updated_at: DateTime<Utc>,
}

impl From<IngredientRow> for Ingredient {
    fn from(row: IngredientRow) -> Self {
        Ingredient {
            id: row.id,
            name: row.name,
            current_stock_in_grams: row.current_stock_in_grams,
            current_stock_value: row.current_stock_value,
            updated_at: row.updated_at,
        }
    }
}

/// Row for locked stock reads
#[derive(Debug, FromRow)]
struct StockRow {
    id: Uuid,
    current_stock_in_grams: Decimal,
    current_stock_value: Decimal,
}

/// Row for procurement records
#[derive(Debug, FromRow)]
struct ProcurementRow {
    id: Uuid,
    ingredient_id: Uuid,
    packages: Decimal,
    spec_weight_grams: Decimal,
    price_per_package: Decimal,
    supplier: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ProcurementRow> for ProcurementRecord {
    fn from(row: ProcurementRow) -> Self {
        ProcurementRecord {
            id: row.id,
            ingredient_id: row.ingredient_id,
            packages: row.packages,
            spec_weight_grams: row.spec_weight_grams,
            price_per_package: row.price_per_package,
            supplier: row.supplier,
            created_at: row.created_at,
        }
    }
}

/// Row for stock adjustments
#[derive(Debug, FromRow)]
struct AdjustmentRow {
    id: Uuid,
    ingredient_id: Uuid,
    delta_grams: Decimal,
    reason: String,
    unit_cost: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl From<AdjustmentRow> for StockAdjustment {
    fn from(row: AdjustmentRow) -> Self {
        StockAdjustment {
            id: row.id,
            ingredient_id: row.ingredient_id,
            delta_grams: row.delta_grams,
            reason: row.reason,
            unit_cost: row.unit_cost,
            created_at: row.created_at,
        }
    }
}

/// Journal entry as stored
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub sequence: i64,
    pub ingredient_id: Uuid,
    pub entry_type: String,
    pub event: serde_json::Value,
    pub quantity_delta: Decimal,
    pub value_delta: Decimal,
    pub quantity_after: Decimal,
    pub value_after: Decimal,
    pub value_clamped: bool,
    pub task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a procurement
#[derive(Debug, Deserialize)]
pub struct RecordProcurementInput {
    pub packages: Decimal,
    pub spec_weight_grams: Decimal,
    pub price_per_package: Decimal,
    pub supplier: Option<String>,
}

/// Input for a manual stock adjustment.
///
/// With `initial_stocking` set the adjustment is the first count of an
/// empty ingredient and `unit_cost` prices it.
#[derive(Debug, Deserialize)]
pub struct AdjustStockInput {
    pub delta_grams: Decimal,
    pub reason: Option<String>,
    pub unit_cost: Option<Decimal>,
    #[serde(default)]
    pub initial_stocking: bool,
}

impl AdjustStockInput {
    fn to_event(&self) -> LedgerEvent {
        if self.initial_stocking {
            LedgerEvent::InitialStocking {
                grams: self.delta_grams,
                unit_cost: self.unit_cost,
                reason: self.reason.clone(),
            }
        } else {
            LedgerEvent::Adjustment {
                delta_grams: self.delta_grams,
                reason: self.reason.clone(),
            }
        }
    }
}

/// Stock after a change, with the weighted-average unit cost
#[derive(Debug, Clone, Serialize)]
pub struct StockUpdate {
    pub ingredient_id: Uuid,
    pub entry_id: Uuid,
    pub entry_type: LedgerEntryType,
    pub quantity_grams: Decimal,
    pub value: Decimal,
    pub unit_cost: Decimal,
    pub currency: String,
    pub quantity_delta: Decimal,
    pub value_delta: Decimal,
    pub value_clamped: bool,
    pub quantity_clamped: bool,
}

/// A stock change together with the record that caused it
#[derive(Debug, Clone, Serialize)]
pub struct StockChange<R> {
    pub stock: StockUpdate,
    pub record: R,
}

/// Stored stock compared with a replay of the journal
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Reconciliation {
    pub ingredient_id: Uuid,
    pub stored: StockSnapshot,
    pub replayed: StockSnapshot,
    pub quantity_drift: Decimal,
    pub value_drift: Decimal,
    pub event_count: usize,
    pub consistent: bool,
}

impl Reconciliation {
    fn new(stored: StockSnapshot, replayed: StockSnapshot, event_count: usize) -> Self {
        let quantity_drift = stored.quantity_grams - replayed.quantity_grams;
        let value_drift = stored.value - replayed.value;
        Self {
            ingredient_id: stored.ingredient_id,
            stored,
            replayed,
            quantity_drift,
            value_drift,
            event_count,
            consistent: quantity_drift.is_zero() && value_drift.is_zero(),
        }
    }
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get an ingredient with its current stock
    pub async fn get_ingredient(&self, ingredient_id: Uuid) -> AppResult<Ingredient> {
        let row = sqlx::query_as::<_, IngredientRow>(
            r#"
            SELECT id, name, current_stock_in_grams, current_stock_value, updated_at
            FROM ingredients
            WHERE id = $1
            "#,
        )
        .bind(ingredient_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Ingredient".to_string()))?;

        Ok(row.into())
    }

    /// Record purchased packages at their price
    pub async fn record_procurement(
        &self,
        ingredient_id: Uuid,
        input: RecordProcurementInput,
        currency: &str,
    ) -> AppResult<StockChange<ProcurementRecord>> {
        validate_procurement(input.packages, input.spec_weight_grams, input.price_per_package)
            .map_err(|msg| AppError::validation("packages", msg))?;

        let event = LedgerEvent::Procurement {
            packages: input.packages,
            spec_weight_grams: input.spec_weight_grams,
            price_per_package: input.price_per_package,
        };

        let mut tx = self.db.begin().await?;
        let snapshot = lock_stock(&mut tx, ingredient_id).await?;
        let outcome = apply_ledger_event(&snapshot, &event)?;
        let entry_id = write_outcome(&mut tx, &outcome, &event, None).await?;

        let record = sqlx::query_as::<_, ProcurementRow>(
            r#"
            INSERT INTO procurement_records (ingredient_id, packages, spec_weight_grams, price_per_package, supplier)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, ingredient_id, packages, spec_weight_grams, price_per_package, supplier, created_at
            "#,
        )
        .bind(ingredient_id)
        .bind(input.packages)
        .bind(input.spec_weight_grams)
        .bind(input.price_per_package)
        .bind(&input.supplier)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            %ingredient_id,
            grams = %outcome.quantity_delta,
            value = %outcome.value_delta,
            "Procurement recorded"
        );

        Ok(StockChange {
            stock: stock_update(&outcome, &event, entry_id, currency),
            record: record.into(),
        })
    }

    /// Apply a manual adjustment or the initial stocking of an empty ingredient
    pub async fn adjust_stock(
        &self,
        ingredient_id: Uuid,
        input: AdjustStockInput,
        currency: &str,
    ) -> AppResult<StockChange<StockAdjustment>> {
        let event = input.to_event();

        let mut tx = self.db.begin().await?;
        let snapshot = lock_stock(&mut tx, ingredient_id).await?;
        let outcome = apply_ledger_event(&snapshot, &event)?;
        let entry_id = write_outcome(&mut tx, &outcome, &event, None).await?;

        let record = sqlx::query_as::<_, AdjustmentRow>(
            r#"
            INSERT INTO stock_adjustments (ingredient_id, delta_grams, reason, unit_cost)
            VALUES ($1, $2, $3, $4)
            RETURNING id, ingredient_id, delta_grams, reason, unit_cost, created_at
            "#,
        )
        .bind(ingredient_id)
        .bind(outcome.quantity_delta)
        .bind(input.reason.as_deref().unwrap_or_default().trim())
        .bind(input.unit_cost)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            %ingredient_id,
            entry_type = event.entry_type().as_str(),
            grams = %outcome.quantity_delta,
            quantity_clamped = outcome.quantity_clamped,
            "Stock adjusted"
        );

        Ok(StockChange {
            stock: stock_update(&outcome, &event, entry_id, currency),
            record: record.into(),
        })
    }

    /// Journal entries of an ingredient, oldest first
    pub async fn list_ledger(&self, ingredient_id: Uuid) -> AppResult<Vec<LedgerEntry>> {
        // Validate ingredient exists
        self.get_ingredient(ingredient_id).await?;

        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, sequence, ingredient_id, entry_type, event, quantity_delta, value_delta,
                   quantity_after, value_after, value_clamped, task_id, created_at
            FROM stock_ledger_entries
            WHERE ingredient_id = $1
            ORDER BY sequence
            "#,
        )
        .bind(ingredient_id)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    /// Replay the journal and compare it with the stored stock fields
    pub async fn reconcile(&self, ingredient_id: Uuid) -> AppResult<Reconciliation> {
        let ingredient = self.get_ingredient(ingredient_id).await?;
        let entries = self.list_ledger(ingredient_id).await?;

        let events = entries
            .into_iter()
            .map(|entry| {
                serde_json::from_value::<LedgerEvent>(entry.event)
                    .map_err(|e| AppError::Internal(format!("Unreadable ledger entry {}: {}", entry.id, e)))
            })
            .collect::<AppResult<Vec<_>>>()?;

        let replayed = replay(ingredient_id, &events)?;
        let reconciliation = Reconciliation::new(ingredient.snapshot(), replayed, events.len());
        if !reconciliation.consistent {
            tracing::warn!(
                %ingredient_id,
                quantity_drift = %reconciliation.quantity_drift,
                value_drift = %reconciliation.value_drift,
                "Stored stock differs from ledger replay"
            );
        }
        Ok(reconciliation)
    }

    /// Current stock of several ingredients, without locking
    pub async fn get_stocks(&self, ingredient_ids: &[Uuid]) -> AppResult<HashMap<Uuid, StockSnapshot>> {
        let rows = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT id, current_stock_in_grams, current_stock_value
            FROM ingredients
            WHERE id = ANY($1)
            "#,
        )
        .bind(ingredient_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|row| (row.id, row.into())).collect())
    }
}

impl From<StockRow> for StockSnapshot {
    fn from(row: StockRow) -> Self {
        StockSnapshot::new(row.id, row.current_stock_in_grams, row.current_stock_value)
    }
}

fn stock_update(outcome: &LedgerOutcome, event: &LedgerEvent, entry_id: Uuid, currency: &str) -> StockUpdate {
    StockUpdate {
        ingredient_id: outcome.after.ingredient_id,
        entry_id,
        entry_type: event.entry_type(),
        quantity_grams: outcome.after.quantity_grams,
        value: outcome.after.value,
        unit_cost: outcome.after.unit_cost(),
        currency: currency.to_string(),
        quantity_delta: outcome.quantity_delta,
        value_delta: outcome.value_delta,
        value_clamped: outcome.value_clamped,
        quantity_clamped: outcome.quantity_clamped,
    }
}

/// Lock one ingredient row for the rest of the transaction
async fn lock_stock(tx: &mut Transaction<'_, Postgres>, ingredient_id: Uuid) -> AppResult<StockSnapshot> {
    let row = sqlx::query_as::<_, StockRow>(
        r#"
        SELECT id, current_stock_in_grams, current_stock_value
        FROM ingredients
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(ingredient_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Ingredient".to_string()))?;

    Ok(row.into())
}

/// Lock several ingredient rows, in id order so concurrent completions
/// cannot deadlock. Unknown ids are simply absent from the result.
pub(crate) async fn lock_stocks(
    tx: &mut Transaction<'_, Postgres>,
    ingredient_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, StockSnapshot>> {
    let rows = sqlx::query_as::<_, StockRow>(
        r#"
        SELECT id, current_stock_in_grams, current_stock_value
        FROM ingredients
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(ingredient_ids)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.into_iter().map(|row| (row.id, row.into())).collect())
}

/// Persist an applied event: new stock fields plus the journal entry.
/// Returns the journal entry id.
pub(crate) async fn write_outcome(
    tx: &mut Transaction<'_, Postgres>,
    outcome: &LedgerOutcome,
    event: &LedgerEvent,
    task_id: Option<Uuid>,
) -> AppResult<Uuid> {
    let ingredient_id = outcome.after.ingredient_id;

    sqlx::query(
        r#"
        UPDATE ingredients
        SET current_stock_in_grams = $1, current_stock_value = $2, updated_at = NOW()
        WHERE id = $3
        "#,
    )
    .bind(outcome.after.quantity_grams)
    .bind(outcome.after.value)
    .bind(ingredient_id)
    .execute(&mut **tx)
    .await?;

    let event_json = serde_json::to_value(event)
        .map_err(|e| anyhow::Error::new(e).context("encoding ledger event"))?;

    let entry_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO stock_ledger_entries (
            ingredient_id, entry_type, event, quantity_delta, value_delta,
            quantity_after, value_after, value_clamped, task_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(ingredient_id)
    .bind(event.entry_type().as_str())
    .bind(event_json)
    .bind(outcome.quantity_delta)
    .bind(outcome.value_delta)
    .bind(outcome.after.quantity_grams)
    .bind(outcome.after.value)
    .bind(outcome.value_clamped)
    .bind(task_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(entry_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_adjust_input_builds_adjustment_event() {
        let input = AdjustStockInput {
            delta_grams: dec("-150"),
            reason: Some("spoiled".to_string()),
            unit_cost: None,
            initial_stocking: false,
        };
        assert_eq!(
            input.to_event(),
            LedgerEvent::Adjustment {
                delta_grams: dec("-150"),
                reason: Some("spoiled".to_string())
            }
        );
    }

    #[test]
    fn test_adjust_input_builds_initial_stocking_event() {
        let input = AdjustStockInput {
            delta_grams: dec("5000"),
            reason: Some("opening count".to_string()),
            unit_cost: Some(dec("0.04")),
            initial_stocking: true,
        };
        assert_eq!(input.to_event().entry_type(), LedgerEntryType::InitialStocking);
    }

    #[test]
    fn test_reconciliation_drift() {
        let id = Uuid::from_u128(1);
        let stored = StockSnapshot::new(id, dec("900"), dec("45"));
        let replayed = StockSnapshot::new(id, dec("1000"), dec("50"));
        let rec = Reconciliation::new(stored, replayed, 3);
        assert_eq!(rec.quantity_drift, dec("-100"));
        assert_eq!(rec.value_drift, dec("-5"));
        assert!(!rec.consistent);

        let rec = Reconciliation::new(replayed, replayed, 3);
        assert!(rec.consistent);
    }

    #[test]
    fn test_stock_update_reports_unit_cost() {
        let id = Uuid::from_u128(1);
        let event = LedgerEvent::Procurement {
            packages: dec("2"),
            spec_weight_grams: dec("1000"),
            price_per_package: dec("40"),
        };
        let outcome = apply_ledger_event(&StockSnapshot::empty(id), &event).unwrap();
        let update = stock_update(&outcome, &event, Uuid::from_u128(9), "THB");
        assert_eq!(update.quantity_grams, dec("2000"));
        assert_eq!(update.value, dec("80"));
        assert_eq!(update.unit_cost, dec("0.04"));
        assert_eq!(update.entry_type, LedgerEntryType::Procurement);
    }

    #[test]
    fn test_journal_replay_agrees_with_numeric_columns() {
        let id = Uuid::from_u128(1);
        let journal = [
            LedgerEvent::Procurement {
                packages: dec("1"),
                spec_weight_grams: dec("25000"),
                price_per_package: dec("733"),
            },
            LedgerEvent::Consumption {
                grams: dec("525.79449994497499419180494249"),
            },
        ];
        let stored_json: Vec<serde_json::Value> = journal.iter().map(|e| serde_json::to_value(e).unwrap()).collect();

        // what NUMERIC(20, 6) hands back after the completion was written
        let stored = StockSnapshot::new(id, dec("24474.205500"), dec("717.583705"));

        let events: Vec<LedgerEvent> = stored_json
            .into_iter()
            .map(|json| serde_json::from_value(json).unwrap())
            .collect();
        let replayed = replay(id, &events).unwrap();
        let rec = Reconciliation::new(stored, replayed, events.len());
        assert!(rec.consistent, "drift {} / {}", rec.quantity_drift, rec.value_drift);
    }

    #[test]
    fn test_record_rows_convert() {
        let now = Utc::now();
        let procurement: ProcurementRecord = ProcurementRow {
            id: Uuid::from_u128(5),
            ingredient_id: Uuid::from_u128(1),
            packages: dec("4"),
            spec_weight_grams: dec("1000"),
            price_per_package: dec("38.5"),
            supplier: Some("Mill".to_string()),
            created_at: now,
        }
        .into();
        assert_eq!(procurement.packages * procurement.spec_weight_grams, dec("4000"));
        assert_eq!(procurement.supplier.as_deref(), Some("Mill"));

        let adjustment: StockAdjustment = AdjustmentRow {
            id: Uuid::from_u128(6),
            ingredient_id: Uuid::from_u128(1),
            delta_grams: dec("-120"),
            reason: "spoiled".to_string(),
            unit_cost: None,
            created_at: now,
        }
        .into();
        assert_eq!(adjustment.delta_grams, dec("-120"));
        assert_eq!(adjustment.created_at, now);
    }
}
