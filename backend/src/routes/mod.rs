//! Route definitions for the bakery production server

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/production", production_routes())
        .nest("/inventory", inventory_routes())
}

/// Production calculation and task routes
fn production_routes() -> Router<AppState> {
    Router::new()
        .route("/calculate", post(handlers::calculate_production))
        .route("/thermals", post(handlers::calculate_thermals))
        .route("/tasks", post(handlers::create_task))
        .route("/tasks/:task_id", get(handlers::get_task))
        .route("/tasks/:task_id/complete", post(handlers::complete_task))
        .route("/tasks/:task_id/cancel", post(handlers::cancel_task))
}

/// Ingredient stock routes
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients/:ingredient_id", get(handlers::get_ingredient))
        .route(
            "/ingredients/:ingredient_id/procurements",
            post(handlers::record_procurement),
        )
        .route(
            "/ingredients/:ingredient_id/adjustments",
            post(handlers::adjust_stock),
        )
        .route("/ingredients/:ingredient_id/ledger", get(handlers::list_ledger))
        .route("/ingredients/:ingredient_id/reconcile", get(handlers::reconcile_stock))
}
