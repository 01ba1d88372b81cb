//! Production planning service
//!
//! Calculates requirements and mixing sheets for a product, and runs the
//! production task lifecycle. Completing a task deducts its consumption from
//! stock in a single transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use bakery_shared::{
    calculate_production, check_projected_stock, compute_thermals, mixing_sheets, plan_consumption,
    validate_temperature, ConsumptionLog, DoughSheet, EngineError, LedgerEvent, ProductionRequirement,
    ProductionTask, StockShortage, TaskStatus, ThermalContext, ThermalInputs, ThermalReport,
};

use crate::config::ProductionConfig;
use crate::error::{AppError, AppResult};
use crate::services::inventory::{self, InventoryService};
use crate::services::RecipeService;

/// Production service for calculations and task lifecycle
#[derive(Clone)]
pub struct ProductionService {
    db: PgPool,
    recipes: RecipeService,
    config: ProductionConfig,
}

/// Floor temperatures for a mixing session; unset values fall back to config
#[derive(Debug, Clone, Deserialize)]
pub struct MixingConditions {
    pub flour_temperature: Decimal,
    pub ambient_temperature: Decimal,
    pub water_temperature: Option<Decimal>,
    pub mixer_friction_factor: Option<Decimal>,
}

impl MixingConditions {
    fn to_context(&self, config: &ProductionConfig) -> AppResult<ThermalContext> {
        let context = ThermalContext {
            mixer_friction_factor: self.mixer_friction_factor.unwrap_or(config.default_mixer_friction),
            flour_temperature: self.flour_temperature,
            ambient_temperature: self.ambient_temperature,
            water_temperature: self.water_temperature.unwrap_or(config.default_water_temperature),
        };
        check_temperature("flour_temperature", context.flour_temperature)?;
        check_temperature("ambient_temperature", context.ambient_temperature)?;
        check_temperature("water_temperature", context.water_temperature)?;
        Ok(context)
    }
}

fn check_temperature(field: &str, celsius: Decimal) -> AppResult<()> {
    validate_temperature(celsius).map_err(|msg| AppError::validation(field, msg))
}

/// Input for a production calculation
#[derive(Debug, Deserialize)]
pub struct CalculateInput {
    pub product_id: Uuid,
    pub planned_piece_count: u32,
    pub conditions: Option<MixingConditions>,
}

/// Requirement, mixing sheets and projected shortages for one product run
#[derive(Debug, Clone, Serialize)]
pub struct ProductionPlan {
    pub requirement: ProductionRequirement,
    pub sheets: Vec<DoughSheet>,
    pub shortages: Vec<StockShortage>,
}

/// Input for a standalone thermal evaluation
#[derive(Debug, Deserialize)]
pub struct ThermalsInput {
    pub target_dough_temperature: Decimal,
    pub conditions: MixingConditions,
    pub total_water_grams: Decimal,
    /// Water in the row being evaluated; the whole batch water when absent
    pub row_water_grams: Option<Decimal>,
    /// Whole-dough flour, for hydration and hold-back advice
    pub total_flour_grams: Option<Decimal>,
}

/// Input for planning a production task
#[derive(Debug, Deserialize)]
pub struct CreateTaskInput {
    pub product_id: Uuid,
    pub planned_piece_count: u32,
    pub production_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Result of completing a task
#[derive(Debug, Clone, Serialize)]
pub struct TaskCompletion {
    pub task: ProductionTask,
    pub requirement: ProductionRequirement,
    pub consumption: Vec<ConsumptionLog>,
    pub consumed_value: Decimal,
    pub currency: String,
}

/// Row for consumption logs
#[derive(Debug, FromRow)]
struct ConsumptionLogRow {
    id: Uuid,
    ingredient_id: Uuid,
    task_id: Uuid,
    grams: Decimal,
    value: Decimal,
    created_at: DateTime<Utc>,
}

impl From<ConsumptionLogRow> for ConsumptionLog {
    fn from(row: ConsumptionLogRow) -> Self {
        ConsumptionLog {
            id: row.id,
            ingredient_id: row.ingredient_id,
            task_id: row.task_id,
            grams: row.grams,
            value: row.value,
            created_at: row.created_at,
        }
    }
}

/// Row for task queries
#[derive(Debug, FromRow)]
struct TaskRow {
    id: Uuid,
    product_id: Uuid,
    planned_piece_count: i32,
    production_date: NaiveDate,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TaskRow> for ProductionTask {
    type Error = AppError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown task status: {}", row.status)))?;
        let planned_piece_count = u32::try_from(row.planned_piece_count)
            .map_err(|_| AppError::Internal(format!("Negative piece count on task {}", row.id)))?;
        Ok(ProductionTask {
            id: row.id,
            product_id: row.product_id,
            planned_piece_count,
            production_date: row.production_date,
            status,
            notes: row.notes,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

const TASK_COLUMNS: &str =
    "id, product_id, planned_piece_count, production_date, status, notes, created_at, completed_at";

/// Evaluate water temperature, ice and hold-back advice for one water row
pub fn evaluate_thermals(config: &ProductionConfig, input: &ThermalsInput) -> AppResult<ThermalReport> {
    check_temperature("target_dough_temperature", input.target_dough_temperature)?;
    if input.total_water_grams < Decimal::ZERO {
        return Err(AppError::validation("total_water_grams", "Water weight cannot be negative"));
    }
    let context = input.conditions.to_context(config)?;

    let mut inputs = ThermalInputs::new(input.target_dough_temperature, context, input.total_water_grams);
    if let Some(row_water) = input.row_water_grams {
        inputs = inputs.with_row_water(row_water);
    }
    if let Some(flour) = input.total_flour_grams {
        inputs = inputs.with_hydration(input.total_water_grams, flour);
    }
    Ok(compute_thermals(&inputs))
}

fn total_value(logs: &[ConsumptionLog]) -> Decimal {
    logs.iter().map(|log| log.value).sum()
}

fn ensure_transition(task: &ProductionTask, next: TaskStatus) -> AppResult<()> {
    if task.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::InvalidStateTransition(format!(
            "Task {} is {} and cannot become {}",
            task.id, task.status, next
        )))
    }
}

impl ProductionService {
    /// Create a new ProductionService instance
    pub fn new(db: PgPool, config: &ProductionConfig) -> Self {
        Self {
            recipes: RecipeService::new(db.clone(), config.max_composition_depth),
            db,
            config: config.clone(),
        }
    }

    /// Requirement and mixing sheets for a product, with projected shortages
    pub async fn calculate(&self, input: CalculateInput) -> AppResult<ProductionPlan> {
        let context = input
            .conditions
            .as_ref()
            .map(|c| c.to_context(&self.config))
            .transpose()?;

        let book = self.recipes.load_product_book(input.product_id).await?;
        let requirement = calculate_production(&book, input.product_id, input.planned_piece_count)?;
        let sheets = mixing_sheets(
            &book,
            requirement.dough_id,
            requirement.batch_flour_weight,
            context.as_ref(),
        )?;

        let ids: Vec<Uuid> = requirement.weights.keys().copied().collect();
        let stocks = InventoryService::new(self.db.clone()).get_stocks(&ids).await?;
        let shortages = match check_projected_stock(&stocks, &requirement.weights) {
            Ok(()) => Vec::new(),
            Err(EngineError::InsufficientStock { shortages }) => shortages,
            Err(err) => return Err(err.into()),
        };

        tracing::debug!(
            product_id = %input.product_id,
            pieces = input.planned_piece_count,
            total_grams = %requirement.total_grams(),
            shortages = shortages.len(),
            "Production calculated"
        );

        Ok(ProductionPlan {
            requirement,
            sheets,
            shortages,
        })
    }

    /// Plan a task; refused when stock cannot cover it.
    /// A zero-piece task is accepted and consumes nothing.
    pub async fn create_task(&self, input: CreateTaskInput) -> AppResult<ProductionTask> {
        let book = self.recipes.load_product_book(input.product_id).await?;
        let requirement = calculate_production(&book, input.product_id, input.planned_piece_count)?;

        let ids: Vec<Uuid> = requirement.weights.keys().copied().collect();
        let stocks = InventoryService::new(self.db.clone()).get_stocks(&ids).await?;
        check_projected_stock(&stocks, &requirement.weights)?;

        let production_date = input.production_date.unwrap_or_else(|| Utc::now().date_naive());
        let planned_piece_count = i32::try_from(input.planned_piece_count)
            .map_err(|_| AppError::validation("planned_piece_count", "Piece count is too large"))?;

        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            INSERT INTO production_tasks (product_id, planned_piece_count, production_date, status, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(input.product_id)
        .bind(planned_piece_count)
        .bind(production_date)
        .bind(TaskStatus::Planned.as_str())
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await?;

        let task = ProductionTask::try_from(row)?;
        tracing::info!(task_id = %task.id, product_id = %task.product_id, "Production task planned");
        Ok(task)
    }

    /// Get a task by id
    pub async fn get_task(&self, task_id: Uuid) -> AppResult<ProductionTask> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM production_tasks WHERE id = $1",
            TASK_COLUMNS
        ))
        .bind(task_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Production task".to_string()))?;

        row.try_into()
    }

    /// Complete a planned task and deduct its consumption from stock.
    ///
    /// Either every ingredient is deducted and the task is completed, or
    /// nothing changes.
    pub async fn complete_task(&self, task_id: Uuid) -> AppResult<TaskCompletion> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM production_tasks WHERE id = $1 FOR UPDATE",
            TASK_COLUMNS
        ))
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Production task".to_string()))?;
        let task = ProductionTask::try_from(row)?;
        ensure_transition(&task, TaskStatus::Completed)?;

        let book = self.recipes.load_product_book(task.product_id).await?;
        let requirement = calculate_production(&book, task.product_id, task.planned_piece_count)?;

        let ids: Vec<Uuid> = requirement.weights.keys().copied().collect();
        let stocks = inventory::lock_stocks(&mut tx, &ids).await?;
        let outcomes = plan_consumption(&stocks, &requirement.weights)?;

        let mut consumption = Vec::with_capacity(outcomes.len());
        for outcome in &outcomes {
            let grams = -outcome.quantity_delta;
            let event = LedgerEvent::Consumption { grams };
            inventory::write_outcome(&mut tx, outcome, &event, Some(task_id)).await?;

            let log = sqlx::query_as::<_, ConsumptionLogRow>(
                r#"
                INSERT INTO consumption_logs (ingredient_id, task_id, grams, value)
                VALUES ($1, $2, $3, $4)
                RETURNING id, ingredient_id, task_id, grams, value, created_at
                "#,
            )
            .bind(outcome.after.ingredient_id)
            .bind(task_id)
            .bind(grams)
            .bind(-outcome.value_delta)
            .fetch_one(&mut *tx)
            .await?;
            consumption.push(ConsumptionLog::from(log));
        }
        let consumed_value = total_value(&consumption);

        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            UPDATE production_tasks
            SET status = $1, completed_at = NOW()
            WHERE id = $2
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(TaskStatus::Completed.as_str())
        .bind(task_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let task = ProductionTask::try_from(row)?;
        tracing::info!(
            %task_id,
            ingredients = outcomes.len(),
            value = %consumed_value,
            "Production task completed"
        );

        Ok(TaskCompletion {
            task,
            requirement,
            consumption,
            consumed_value,
            currency: self.config.currency.clone(),
        })
    }

    /// Cancel a planned task; stock is untouched
    pub async fn cancel_task(&self, task_id: Uuid) -> AppResult<ProductionTask> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM production_tasks WHERE id = $1 FOR UPDATE",
            TASK_COLUMNS
        ))
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Production task".to_string()))?;
        let task = ProductionTask::try_from(row)?;
        ensure_transition(&task, TaskStatus::Cancelled)?;

        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "UPDATE production_tasks SET status = $1 WHERE id = $2 RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(TaskStatus::Cancelled.as_str())
        .bind(task_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(%task_id, "Production task cancelled");
        row.try_into()
    }
}
