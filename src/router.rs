use crate::handlers::{
    catchup::run_catch_up,
    health::health_check,
    rules::{
        create_rule, delete_rule, get_installment_summary, get_rule, get_rule_occurrences,
        get_rules, pause_rule, resume_rule, update_rule,
    },
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Rule CRUD routes
        .route("/api/v1/rules", post(create_rule))
        .route("/api/v1/rules", get(get_rules))
        .route("/api/v1/rules/:rule_id", get(get_rule))
        .route("/api/v1/rules/:rule_id", put(update_rule))
        .route("/api/v1/rules/:rule_id", delete(delete_rule))
        // Rule lifecycle routes
        .route("/api/v1/rules/:rule_id/pause", post(pause_rule))
        .route("/api/v1/rules/:rule_id/resume", post(resume_rule))
        // Generated occurrence routes
        .route("/api/v1/rules/:rule_id/occurrences", get(get_rule_occurrences))
        .route(
            "/api/v1/rules/:rule_id/installment-summary",
            get(get_installment_summary),
        )
        // On-demand catch-up
        .route("/api/v1/catch-up", post(run_catch_up))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
