//! Error handling for the bakery production server
//!
//! Provides consistent error responses in Thai and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bakery_shared::{EngineError, StockShortage};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_th: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Validation error from one of the shared static-message validators
    pub fn validation(field: &str, message: &'static str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_th: format!("ข้อมูลไม่ถูกต้อง: {}", message),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_th: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shortages: Vec<StockShortage>,
}

impl ErrorDetail {
    fn new(code: &str, message_en: String, message_th: String) -> Self {
        Self {
            code: code.to_string(),
            message_en,
            message_th,
            field: None,
            shortages: Vec::new(),
        }
    }
}

fn engine_error_detail(err: &EngineError) -> (StatusCode, ErrorDetail) {
    match err {
        EngineError::UndefinedComposition { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new(
                "UNDEFINED_COMPOSITION",
                err.to_string(),
                "สูตรมีอัตราส่วนรวมเป็นศูนย์".to_string(),
            ),
        ),
        EngineError::CyclicComposition { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new(
                "CYCLIC_COMPOSITION",
                err.to_string(),
                "สูตรอ้างอิงตัวเองผ่านโดว์ตั้งต้น".to_string(),
            ),
        ),
        EngineError::DivisionByZero { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new(
                "DIVISION_BY_ZERO",
                err.to_string(),
                "อัตราการสูญเสียต้องน้อยกว่า 100%".to_string(),
            ),
        ),
        EngineError::MissingRecipe { .. } | EngineError::MissingProduct { .. } => (
            StatusCode::NOT_FOUND,
            ErrorDetail::new("NOT_FOUND", err.to_string(), "ไม่พบสูตรหรือสินค้า".to_string()),
        ),
        EngineError::CompositionTooDeep { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new(
                "COMPOSITION_TOO_DEEP",
                err.to_string(),
                "โดว์ตั้งต้นซ้อนกันลึกเกินไป".to_string(),
            ),
        ),
        EngineError::InvalidRatio { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new(
                "INVALID_RATIO",
                err.to_string(),
                "อัตราส่วนในสูตรติดลบ".to_string(),
            ),
        ),
        EngineError::InsufficientStock { shortages } => {
            let mut detail = ErrorDetail::new(
                "INSUFFICIENT_STOCK",
                err.to_string(),
                format!("วัตถุดิบไม่เพียงพอ {} รายการ", shortages.len()),
            );
            detail.shortages = shortages.clone();
            (StatusCode::CONFLICT, detail)
        }
        EngineError::InvalidAdjustment { message, .. } => (
            StatusCode::BAD_REQUEST,
            ErrorDetail::new(
                "INVALID_ADJUSTMENT",
                err.to_string(),
                format!("การปรับสต็อกไม่ถูกต้อง: {}", message),
            ),
        ),
        EngineError::InvalidLedgerEvent { message, .. } => (
            StatusCode::BAD_REQUEST,
            ErrorDetail::new(
                "INVALID_LEDGER_EVENT",
                err.to_string(),
                format!("รายการสต็อกไม่ถูกต้อง: {}", message),
            ),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation { field, message, message_th } => {
                let mut detail = ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_th.clone());
                detail.field = Some(field.clone());
                (StatusCode::BAD_REQUEST, detail)
            }
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    format!("ไม่พบ {}", resource),
                ),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "INVALID_STATE_TRANSITION",
                    msg.clone(),
                    format!("ไม่สามารถเปลี่ยนสถานะได้: {}", msg),
                ),
            ),
            AppError::Engine(err) => engine_error_detail(err),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    "เกิดข้อผิดพลาดกับฐานข้อมูล".to_string(),
                ),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    msg.clone(),
                    "เกิดข้อผิดพลาดภายในเซิร์ฟเวอร์".to_string(),
                ),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    "เกิดข้อผิดพลาดภายในเซิร์ฟเวอร์".to_string(),
                ),
            ),
        };

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
