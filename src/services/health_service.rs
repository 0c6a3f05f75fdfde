use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the session store and report whether it answers.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let store = state.config().store().as_str();
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(store),
        Err(err) => {
            warn!(backend = err.backend(), error = %err, "storage health check failed");
            HealthResponse::degraded(store)
        }
    }
}
