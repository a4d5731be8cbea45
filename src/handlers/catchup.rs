use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use super::engine_error_response;
use crate::handlers::rules::OccurrenceResponse;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Query parameters for the catch-up endpoint
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct CatchUpQuery {
    /// Generate everything due on or before this date (default: today)
    pub as_of: Option<NaiveDate>,
}

/// Occurrences generated for one rule during a catch-up run
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CatchUpRuleResult {
    pub rule_id: i32,
    pub occurrences: Vec<OccurrenceResponse>,
}

/// Run occurrence generation for every due rule
///
/// Safe to call repeatedly; already-generated occurrences are never
/// duplicated. Rules that produced nothing new are omitted from the result.
#[utoipa::path(
    post,
    path = "/api/v1/catch-up",
    tag = "catch-up",
    params(CatchUpQuery),
    responses(
        (status = 200, description = "Catch-up completed", body = ApiResponse<Vec<CatchUpRuleResult>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn run_catch_up(
    Query(query): Query<CatchUpQuery>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CatchUpRuleResult>>>, (StatusCode, Json<ErrorResponse>)> {
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());

    let generated = state.engine.driver.run_catch_up(as_of).await.map_err(|e| {
        warn!("Catch-up run failed: {}", e);
        engine_error_response(e)
    })?;

    let mut results: Vec<CatchUpRuleResult> = generated
        .into_iter()
        .map(|(rule_id, occurrences)| CatchUpRuleResult {
            rule_id,
            occurrences: occurrences.into_iter().map(OccurrenceResponse::from).collect(),
        })
        .collect();
    results.sort_by_key(|result| result.rule_id);

    info!(
        "Catch-up as of {} generated occurrences for {} rules",
        as_of,
        results.len()
    );

    Ok(Json(ApiResponse {
        data: results,
        message: "Catch-up completed".to_string(),
        success: true,
    }))
}
