pub mod catchup;
pub mod health;
pub mod rules;

use axum::{http::StatusCode, response::Json};
use engine::error::EngineError;

use crate::schemas::ErrorResponse;

/// Maps engine errors onto HTTP status codes and the error envelope.
pub fn engine_error_response(err: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &err {
        EngineError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        EngineError::InvalidFrequency(_) => (StatusCode::BAD_REQUEST, "INVALID_FREQUENCY"),
        EngineError::InvalidInstallmentPlan(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_INSTALLMENT_PLAN")
        }
        EngineError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        EngineError::ConcurrentModification(_) => {
            (StatusCode::CONFLICT, "CONCURRENT_MODIFICATION")
        }
        EngineError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: code.to_string(),
            success: false,
        }),
    )
}

/// Bad-request envelope for errors raised before the engine is involved.
pub fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
            code: "VALIDATION_ERROR".to_string(),
            success: false,
        }),
    )
}

/// Not-found envelope for read handlers that query the database directly.
pub fn not_found(rule_id: i32) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("rule {rule_id} not found"),
            code: "NOT_FOUND".to_string(),
            success: false,
        }),
    )
}
