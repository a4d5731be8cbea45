use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use engine::repository::seaorm::SeaOrmRuleRepository;
use sea_orm::Database;

use crate::schemas::AppState;

/// Initialize application state against a specific database URL
pub async fn initialize_app_state_with_url(database_url: &str) -> Result<AppState> {
    // Connect to database
    tracing::info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    // Wire the engine over the SeaORM-backed repository
    let repo = Arc::new(SeaOrmRuleRepository::new(db.clone()));
    let engine = Arc::new(engine::default_engine(repo));

    Ok(AppState { db, engine })
}

/// Interval of the periodic catch-up job, if one is configured.
pub fn get_catch_up_interval() -> Option<Duration> {
    std::env::var("CATCH_UP_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse().ok())
        .map(Duration::from_secs)
}
