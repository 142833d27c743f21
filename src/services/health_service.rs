use crate::{dto::health::HealthResponse, state::SharedState};

/// Build the liveness payload for the health route.
pub fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.sessions().len())
}
