//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub database: &'static str,
}

/// Reports server version and database connectivity
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "connected",
        Err(err) => {
            tracing::warn!(error = %err, "Health check could not reach the database");
            "disconnected"
        }
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        database,
    })
}
