use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDate;
use engine::lifecycle::{RuleSpec, RuleUpdate};
use model::entities::{
    occurrence,
    recurrence_rule::{self, FrequencyType, RuleStatus},
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};

use super::{bad_request, engine_error_response, not_found};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Request body for creating a recurrence rule
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateRuleRequest {
    /// Owning user ID
    pub owner_id: i32,
    /// Name of the rule
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Amount (positive for income, negative for expense); the total
    /// amount for installment plans
    pub amount: Decimal,
    /// ISO currency code
    pub currency: String,
    /// Optional category ID
    pub category_id: Option<i32>,
    /// Target account ID
    pub account_id: i32,
    /// Frequency type: Daily, Weekly, Monthly or Yearly
    pub frequency_type: String, // Will be parsed to FrequencyType
    /// How many periods to advance per occurrence (default: 1)
    pub frequency_interval: Option<i32>,
    /// Day of month (1-31) monthly/yearly occurrences anchor to
    pub anchor_day: Option<i32>,
    /// Date of the first occurrence
    pub start_date: NaiveDate,
    /// Optional date of the last occurrence
    pub end_date: Option<NaiveDate>,
    /// Whether this rule is an installment plan
    pub is_installment: Option<bool>,
    /// Number of occurrences for installment plans
    pub total_occurrences: Option<i32>,
}

/// Request body for updating a recurrence rule
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateRuleRequest {
    /// Name of the rule
    pub name: Option<String>,
    /// Optional description
    pub description: Option<String>,
    /// Amount (positive for income, negative for expense)
    pub amount: Option<Decimal>,
    /// Optional category ID
    pub category_id: Option<i32>,
    /// Target account ID
    pub account_id: Option<i32>,
    /// Frequency type: Daily, Weekly, Monthly or Yearly
    pub frequency_type: Option<String>, // Will be parsed to FrequencyType
    /// How many periods to advance per occurrence
    pub frequency_interval: Option<i32>,
    /// Day of month (1-31) monthly/yearly occurrences anchor to
    pub anchor_day: Option<i32>,
    /// Optional date of the last occurrence
    pub end_date: Option<NaiveDate>,
    /// Number of occurrences for installment plans
    pub total_occurrences: Option<i32>,
}

/// Recurrence rule response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RuleResponse {
    pub id: i32,
    pub owner_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub category_id: Option<i32>,
    pub account_id: i32,
    pub frequency_type: String,
    pub frequency_interval: i32,
    pub anchor_day: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_installment: bool,
    pub total_occurrences: Option<i32>,
    pub occurrences_generated: i32,
    pub next_due_date: NaiveDate,
    pub status: String,
}

impl From<recurrence_rule::Model> for RuleResponse {
    fn from(model: recurrence_rule::Model) -> Self {
        Self {
            id: model.id,
            owner_id: model.owner_id,
            name: model.name,
            description: model.description,
            amount: model.amount,
            currency: model.currency,
            category_id: model.category_id,
            account_id: model.account_id,
            frequency_type: format!("{:?}", model.frequency_type),
            frequency_interval: model.frequency_interval,
            anchor_day: model.anchor_day,
            start_date: model.start_date,
            end_date: model.end_date,
            is_installment: model.is_installment,
            total_occurrences: model.total_occurrences,
            occurrences_generated: model.occurrences_generated,
            next_due_date: model.next_due_date,
            status: format!("{:?}", model.status),
        }
    }
}

/// Occurrence response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OccurrenceResponse {
    pub id: i32,
    pub rule_id: i32,
    pub sequence_index: i32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

impl From<occurrence::Model> for OccurrenceResponse {
    fn from(model: occurrence::Model) -> Self {
        Self {
            id: model.id,
            rule_id: model.rule_id,
            sequence_index: model.sequence_index,
            amount: model.amount,
            due_date: model.due_date,
        }
    }
}

/// Installment summary response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InstallmentSummaryResponse {
    pub total_amount: Decimal,
    pub total_occurrences: i32,
    pub occurrences_generated: i32,
    pub amount_paid: Decimal,
    pub next_installment_amount: Option<Decimal>,
    pub remaining_occurrences: i32,
}

/// Query parameters for listing rules
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct RuleQuery {
    /// Page number (default: 1)
    pub page: Option<u64>,
    /// Page size (default: 50)
    pub limit: Option<u64>,
    /// Filter by owning user ID
    pub owner_id: Option<i32>,
    /// Filter by account ID
    pub account_id: Option<i32>,
}

/// Query parameters for update and delete operations
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct DeleteFutureQuery {
    /// Whether to delete not-yet-due occurrences generated under the old
    /// schedule (default: false)
    #[serde(default)]
    pub delete_future: bool,
}

fn parse_frequency_type(value: &str) -> Result<FrequencyType, String> {
    match value.to_ascii_lowercase().as_str() {
        "daily" => Ok(FrequencyType::Daily),
        "weekly" => Ok(FrequencyType::Weekly),
        "monthly" => Ok(FrequencyType::Monthly),
        "yearly" => Ok(FrequencyType::Yearly),
        other => Err(format!("unknown frequency type: {other}")),
    }
}

/// Create a new recurrence rule
#[utoipa::path(
    post,
    path = "/api/v1/rules",
    tag = "rules",
    request_body = CreateRuleRequest,
    responses(
        (status = 201, description = "Rule created successfully", body = ApiResponse<RuleResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_rule(
    State(state): State<AppState>,
    Json(request): Json<CreateRuleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RuleResponse>>), (StatusCode, Json<ErrorResponse>)> {
    trace!("Entering create_rule function");

    let frequency_type = parse_frequency_type(&request.frequency_type).map_err(bad_request)?;

    let spec = RuleSpec {
        owner_id: request.owner_id,
        name: request.name,
        description: request.description,
        amount: request.amount,
        currency: request.currency,
        category_id: request.category_id,
        account_id: request.account_id,
        frequency_type,
        frequency_interval: request.frequency_interval.unwrap_or(1),
        anchor_day: request.anchor_day,
        start_date: request.start_date,
        end_date: request.end_date,
        is_installment: request.is_installment.unwrap_or(false),
        total_occurrences: request.total_occurrences,
    };

    let rule = state.engine.lifecycle.create(spec).await.map_err(|e| {
        warn!("Failed to create rule: {}", e);
        engine_error_response(e)
    })?;

    debug!("Created rule with ID: {}", rule.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: RuleResponse::from(rule),
            message: "Rule created successfully".to_string(),
            success: true,
        }),
    ))
}

/// List recurrence rules
#[utoipa::path(
    get,
    path = "/api/v1/rules",
    tag = "rules",
    params(RuleQuery),
    responses(
        (status = 200, description = "Rules retrieved successfully", body = ApiResponse<Vec<RuleResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_rules(
    State(state): State<AppState>,
    Query(query): Query<RuleQuery>,
) -> Result<Json<ApiResponse<Vec<RuleResponse>>>, StatusCode> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(50).clamp(1, 200);

    let mut finder = recurrence_rule::Entity::find()
        .filter(recurrence_rule::Column::Status.ne(RuleStatus::Deleted));

    if let Some(owner_id) = query.owner_id {
        finder = finder.filter(recurrence_rule::Column::OwnerId.eq(owner_id));
    }
    if let Some(account_id) = query.account_id {
        finder = finder.filter(recurrence_rule::Column::AccountId.eq(account_id));
    }

    let rules = finder
        .order_by_asc(recurrence_rule::Column::Id)
        .paginate(&state.db, limit)
        .fetch_page(page - 1)
        .await
        .map_err(|e| {
            error!("Database error while listing rules: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(ApiResponse {
        data: rules.into_iter().map(RuleResponse::from).collect(),
        message: "Rules retrieved successfully".to_string(),
        success: true,
    }))
}

/// Get a recurrence rule by ID
#[utoipa::path(
    get,
    path = "/api/v1/rules/{rule_id}",
    tag = "rules",
    params(("rule_id" = i32, Path, description = "Rule ID")),
    responses(
        (status = 200, description = "Rule retrieved successfully", body = ApiResponse<RuleResponse>),
        (status = 404, description = "Rule not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_rule(
    Path(rule_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RuleResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let rule = find_visible_rule(&state, rule_id).await?;

    Ok(Json(ApiResponse {
        data: RuleResponse::from(rule),
        message: "Rule retrieved successfully".to_string(),
        success: true,
    }))
}

/// Update a recurrence rule
#[utoipa::path(
    put,
    path = "/api/v1/rules/{rule_id}",
    tag = "rules",
    params(("rule_id" = i32, Path, description = "Rule ID"), DeleteFutureQuery),
    request_body = UpdateRuleRequest,
    responses(
        (status = 200, description = "Rule updated successfully", body = ApiResponse<RuleResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Rule not found", body = ErrorResponse),
        (status = 409, description = "Concurrent modification", body = ErrorResponse),
        (status = 422, description = "Invalid installment plan", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_rule(
    Path(rule_id): Path<i32>,
    Query(query): Query<DeleteFutureQuery>,
    State(state): State<AppState>,
    Json(request): Json<UpdateRuleRequest>,
) -> Result<Json<ApiResponse<RuleResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let frequency_type = match &request.frequency_type {
        Some(value) => Some(parse_frequency_type(value).map_err(bad_request)?),
        None => None,
    };

    let update = RuleUpdate {
        name: request.name,
        description: request.description,
        amount: request.amount,
        category_id: request.category_id,
        account_id: request.account_id,
        frequency_type,
        frequency_interval: request.frequency_interval,
        anchor_day: request.anchor_day,
        end_date: request.end_date,
        total_occurrences: request.total_occurrences,
    };

    let rule = state
        .engine
        .lifecycle
        .update(rule_id, update, query.delete_future)
        .await
        .map_err(|e| {
            warn!("Failed to update rule {}: {}", rule_id, e);
            engine_error_response(e)
        })?;

    Ok(Json(ApiResponse {
        data: RuleResponse::from(rule),
        message: "Rule updated successfully".to_string(),
        success: true,
    }))
}

/// Delete a recurrence rule
///
/// The rule is soft-deleted. Past occurrences always survive as financial
/// history; future ones are removed when `delete_future` is set.
#[utoipa::path(
    delete,
    path = "/api/v1/rules/{rule_id}",
    tag = "rules",
    params(("rule_id" = i32, Path, description = "Rule ID"), DeleteFutureQuery),
    responses(
        (status = 204, description = "Rule deleted successfully"),
        (status = 404, description = "Rule not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_rule(
    Path(rule_id): Path<i32>,
    Query(query): Query<DeleteFutureQuery>,
    State(state): State<AppState>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    state
        .engine
        .lifecycle
        .delete(rule_id, query.delete_future)
        .await
        .map_err(|e| {
            warn!("Failed to delete rule {}: {}", rule_id, e);
            engine_error_response(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Pause a recurrence rule
#[utoipa::path(
    post,
    path = "/api/v1/rules/{rule_id}/pause",
    tag = "rules",
    params(("rule_id" = i32, Path, description = "Rule ID")),
    responses(
        (status = 200, description = "Rule paused successfully", body = ApiResponse<RuleResponse>),
        (status = 400, description = "Rule cannot be paused", body = ErrorResponse),
        (status = 404, description = "Rule not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn pause_rule(
    Path(rule_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RuleResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let rule = state
        .engine
        .lifecycle
        .pause(rule_id)
        .await
        .map_err(engine_error_response)?;

    Ok(Json(ApiResponse {
        data: RuleResponse::from(rule),
        message: "Rule paused successfully".to_string(),
        success: true,
    }))
}

/// Resume a paused recurrence rule
#[utoipa::path(
    post,
    path = "/api/v1/rules/{rule_id}/resume",
    tag = "rules",
    params(("rule_id" = i32, Path, description = "Rule ID")),
    responses(
        (status = 200, description = "Rule resumed successfully", body = ApiResponse<RuleResponse>),
        (status = 400, description = "Rule cannot be resumed", body = ErrorResponse),
        (status = 404, description = "Rule not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn resume_rule(
    Path(rule_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RuleResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let rule = state
        .engine
        .lifecycle
        .resume(rule_id)
        .await
        .map_err(engine_error_response)?;

    Ok(Json(ApiResponse {
        data: RuleResponse::from(rule),
        message: "Rule resumed successfully".to_string(),
        success: true,
    }))
}

/// List the occurrences generated from a rule
#[utoipa::path(
    get,
    path = "/api/v1/rules/{rule_id}/occurrences",
    tag = "rules",
    params(("rule_id" = i32, Path, description = "Rule ID")),
    responses(
        (status = 200, description = "Occurrences retrieved successfully", body = ApiResponse<Vec<OccurrenceResponse>>),
        (status = 404, description = "Rule not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_rule_occurrences(
    Path(rule_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<OccurrenceResponse>>>, (StatusCode, Json<ErrorResponse>)> {
    find_visible_rule(&state, rule_id).await?;

    let occurrences = occurrence::Entity::find()
        .filter(occurrence::Column::RuleId.eq(rule_id))
        .order_by_asc(occurrence::Column::SequenceIndex)
        .all(&state.db)
        .await
        .map_err(|e| {
            error!("Database error while listing occurrences: {}", e);
            engine_error_response(e.into())
        })?;

    Ok(Json(ApiResponse {
        data: occurrences.into_iter().map(OccurrenceResponse::from).collect(),
        message: "Occurrences retrieved successfully".to_string(),
        success: true,
    }))
}

/// Get the installment summary of a rule
#[utoipa::path(
    get,
    path = "/api/v1/rules/{rule_id}/installment-summary",
    tag = "rules",
    params(("rule_id" = i32, Path, description = "Rule ID")),
    responses(
        (status = 200, description = "Summary retrieved successfully", body = ApiResponse<InstallmentSummaryResponse>),
        (status = 400, description = "Rule is not an installment plan", body = ErrorResponse),
        (status = 404, description = "Rule not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_installment_summary(
    Path(rule_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<InstallmentSummaryResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let rule = find_visible_rule(&state, rule_id).await?;

    let summary = engine::summary::installment_summary(&rule)
        .map_err(engine_error_response)?
        .ok_or_else(|| bad_request(format!("rule {rule_id} is not an installment plan")))?;

    Ok(Json(ApiResponse {
        data: InstallmentSummaryResponse {
            total_amount: summary.total_amount,
            total_occurrences: summary.total_occurrences,
            occurrences_generated: summary.occurrences_generated,
            amount_paid: summary.amount_paid,
            next_installment_amount: summary.next_installment_amount,
            remaining_occurrences: summary.remaining_occurrences,
        },
        message: "Summary retrieved successfully".to_string(),
        success: true,
    }))
}

/// Fetches a rule, treating deleted rules as absent.
async fn find_visible_rule(
    state: &AppState,
    rule_id: i32,
) -> Result<recurrence_rule::Model, (StatusCode, Json<ErrorResponse>)> {
    match recurrence_rule::Entity::find_by_id(rule_id)
        .one(&state.db)
        .await
    {
        Ok(Some(rule)) if rule.status != RuleStatus::Deleted => Ok(rule),
        Ok(_) => Err(not_found(rule_id)),
        Err(e) => {
            error!("Database error while fetching rule {}: {}", rule_id, e);
            Err(engine_error_response(e.into()))
        }
    }
}
