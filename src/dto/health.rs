use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status, always `"ok"` while the process is serving.
    pub status: String,
    /// Number of sessions currently held by the registry.
    pub sessions: usize,
}

impl HealthResponse {
    /// Create a health response carrying the current session count.
    pub fn ok(sessions: usize) -> Self {
        Self {
            status: "ok".to_string(),
            sessions,
        }
    }
}
