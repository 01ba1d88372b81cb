//! HTTP handlers for ingredient stock endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use bakery_shared::{Ingredient, ProcurementRecord, StockAdjustment};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::inventory::{
    AdjustStockInput, InventoryService, LedgerEntry, Reconciliation, RecordProcurementInput, StockChange,
};
use crate::AppState;

/// Get an ingredient with its current stock
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(ingredient_id): Path<Uuid>,
) -> AppResult<Json<Ingredient>> {
    let service = InventoryService::new(state.db);
    let ingredient = service.get_ingredient(ingredient_id).await?;
    Ok(Json(ingredient))
}

/// Record a procurement
pub async fn record_procurement(
    State(state): State<AppState>,
    Path(ingredient_id): Path<Uuid>,
    Json(input): Json<RecordProcurementInput>,
) -> AppResult<Json<StockChange<ProcurementRecord>>> {
    let service = InventoryService::new(state.db);
    let update = service
        .record_procurement(ingredient_id, input, &state.config.production.currency)
        .await?;
    Ok(Json(update))
}

/// Adjust stock manually, or record the initial stocking
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(ingredient_id): Path<Uuid>,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<StockChange<StockAdjustment>>> {
    let service = InventoryService::new(state.db);
    let update = service
        .adjust_stock(ingredient_id, input, &state.config.production.currency)
        .await?;
    Ok(Json(update))
}

/// List the stock journal of an ingredient
pub async fn list_ledger(
    State(state): State<AppState>,
    Path(ingredient_id): Path<Uuid>,
) -> AppResult<Json<Vec<LedgerEntry>>> {
    let service = InventoryService::new(state.db);
    let entries = service.list_ledger(ingredient_id).await?;
    Ok(Json(entries))
}

/// Compare stored stock with a replay of the journal
pub async fn reconcile_stock(
    State(state): State<AppState>,
    Path(ingredient_id): Path<Uuid>,
) -> AppResult<Json<Reconciliation>> {
    let service = InventoryService::new(state.db);
    let reconciliation = service.reconcile(ingredient_id).await?;
    Ok(Json(reconciliation))
}
