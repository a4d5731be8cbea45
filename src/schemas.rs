use std::sync::Arc;

use engine::RecurrenceEngine;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection, used directly by the read-only handlers
    pub db: DatabaseConnection,
    /// The recurrence engine; all rule and occurrence mutation goes
    /// through its lifecycle manager, generator and driver
    pub engine: Arc<RecurrenceEngine>,
}

/// API response wrapper
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

/// Error response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::rules::create_rule,
        crate::handlers::rules::get_rules,
        crate::handlers::rules::get_rule,
        crate::handlers::rules::update_rule,
        crate::handlers::rules::delete_rule,
        crate::handlers::rules::pause_rule,
        crate::handlers::rules::resume_rule,
        crate::handlers::rules::get_rule_occurrences,
        crate::handlers::rules::get_installment_summary,
        crate::handlers::catchup::run_catch_up,
    ),
    components(
        schemas(
            crate::handlers::rules::CreateRuleRequest,
            crate::handlers::rules::UpdateRuleRequest,
            crate::handlers::rules::RuleResponse,
            crate::handlers::rules::OccurrenceResponse,
            crate::handlers::rules::InstallmentSummaryResponse,
            crate::handlers::catchup::CatchUpRuleResult,
            ApiResponse<crate::handlers::rules::RuleResponse>,
            ApiResponse<Vec<crate::handlers::rules::RuleResponse>>,
            ApiResponse<Vec<crate::handlers::rules::OccurrenceResponse>>,
            ApiResponse<crate::handlers::rules::InstallmentSummaryResponse>,
            ApiResponse<Vec<crate::handlers::catchup::CatchUpRuleResult>>,
            ErrorResponse,
            HealthResponse,
        )
    ),
    tags(
        (name = "health", description = "Service health"),
        (name = "rules", description = "Recurrence rule lifecycle"),
        (name = "catch-up", description = "Occurrence generation")
    )
)]
pub struct ApiDoc;
