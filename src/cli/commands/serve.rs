use anyhow::Result;
use chrono::Utc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace};

use crate::config::{get_catch_up_interval, initialize_app_state_with_url};
use crate::router::create_router;

pub async fn serve(database_url: &str, bind_address: &str) -> Result<()> {
    trace!("Entering serve function");
    info!("Recurra application starting up");
    debug!("Database URL: {}", database_url);
    debug!("Bind address: {}", bind_address);

    // Initialize application state
    let state = match initialize_app_state_with_url(database_url).await {
        Ok(state) => {
            debug!("Application state initialized successfully");
            state
        }
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    // Periodic catch-up job: generates everything that came due since the
    // last run. Rules are processed independently, so a failing rule only
    // logs a warning and the batch continues.
    if let Some(interval) = get_catch_up_interval() {
        info!("Spawning catch-up job every {:?}", interval);
        let engine = state.engine.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let today = Utc::now().date_naive();
                match engine.driver.run_catch_up(today).await {
                    Ok(results) => {
                        debug!("catch-up generated occurrences for {} rules", results.len())
                    }
                    Err(e) => error!("catch-up run failed: {}", e),
                }
            }
        });
    }

    // Create router
    let app = create_router(state);
    debug!("Router created successfully");

    // Start server
    info!("Starting server on {}", bind_address);
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => {
            debug!("Successfully bound to address: {}", bind_address);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", bind_address, e);
            return Err(e.into());
        }
    };

    info!("Recurra API server running on http://{}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}
