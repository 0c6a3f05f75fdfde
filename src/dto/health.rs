use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the session store does not answer.
    pub status: String,
    /// Configured storage backend.
    pub store: String,
}

impl HealthResponse {
    pub fn ok(store: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            store: store.into(),
        }
    }

    /// The session store failed its health check.
    pub fn degraded(store: impl Into<String>) -> Self {
        Self {
            status: "degraded".to_string(),
            store: store.into(),
        }
    }
}
