//! HTTP handlers for production calculation and task endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bakery_shared::{ProductionTask, ThermalReport};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::production::{
    evaluate_thermals, CalculateInput, CreateTaskInput, ProductionPlan, TaskCompletion, ThermalsInput,
};
use crate::services::ProductionService;
use crate::AppState;

/// Calculate requirements and mixing sheets for a product run
pub async fn calculate_production(
    State(state): State<AppState>,
    Json(input): Json<CalculateInput>,
) -> AppResult<Json<ProductionPlan>> {
    let service = ProductionService::new(state.db, &state.config.production);
    let plan = service.calculate(input).await?;
    Ok(Json(plan))
}

/// Evaluate water temperature and ice for a single water row
pub async fn calculate_thermals(
    State(state): State<AppState>,
    Json(input): Json<ThermalsInput>,
) -> AppResult<Json<ThermalReport>> {
    let report = evaluate_thermals(&state.config.production, &input)?;
    Ok(Json(report))
}

/// Plan a production task
pub async fn create_task(
    State(state): State<AppState>,
    Json(input): Json<CreateTaskInput>,
) -> AppResult<(StatusCode, Json<ProductionTask>)> {
    let service = ProductionService::new(state.db, &state.config.production);
    let task = service.create_task(input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Get a production task
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> AppResult<Json<ProductionTask>> {
    let service = ProductionService::new(state.db, &state.config.production);
    let task = service.get_task(task_id).await?;
    Ok(Json(task))
}

/// Complete a task and deduct its consumption from stock
pub async fn complete_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> AppResult<Json<TaskCompletion>> {
    let service = ProductionService::new(state.db, &state.config.production);
    let completion = service.complete_task(task_id).await?;
    Ok(Json(completion))
}

/// Cancel a planned task
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> AppResult<Json<ProductionTask>> {
    let service = ProductionService::new(state.db, &state.config.production);
    let task = service.cancel_task(task_id).await?;
    Ok(Json(task))
}
